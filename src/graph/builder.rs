use tracing::debug;

use crate::error::{EngineError, Result};

use super::{ArcEntry, CsrGraph, VertexId};

/// Builds the CSR layout from an arc list in two passes: a degree count
/// that becomes the offset array by exclusive prefix sum, then a scatter
/// that places flagged entries through a per-vertex write cursor.
pub struct GraphBuilder;

impl GraphBuilder {
    /// `build_incoming` materializes each arc at both endpoints so reverse
    /// traversals can scan backward-flagged entries. Undirected graphs
    /// always store both entries; with incoming arcs requested each entry
    /// then carries both flags.
    pub fn from_arc_list(
        num_vertices: usize,
        arcs_in: &[(VertexId, VertexId)],
        directed: bool,
        build_incoming: bool,
    ) -> Result<CsrGraph> {
        let both_endpoints = build_incoming || !directed;
        let physical = if both_endpoints {
            arcs_in.len() * 2
        } else {
            arcs_in.len()
        };
        if physical > u32::MAX as usize {
            return Err(EngineError::InvalidArgument(format!(
                "arc count {physical} exceeds the 32-bit arc id space"
            )));
        }
        debug!(
            num_vertices,
            logical_arcs = arcs_in.len(),
            physical_arcs = physical,
            directed,
            build_incoming,
            "graph.build.start"
        );

        let mut offsets = vec![0u32; num_vertices + 1];
        for &(u, v) in arcs_in {
            if u as usize >= num_vertices || v as usize >= num_vertices {
                return Err(EngineError::InvalidArgument(format!(
                    "arc ({u}, {v}) references a vertex outside [0, {num_vertices})"
                )));
            }
            offsets[u as usize] += 1;
            if both_endpoints {
                offsets[v as usize] += 1;
            }
        }

        // Exclusive prefix sum; `cursor` keeps the running write position
        // per vertex while `offsets` freezes into the final block starts.
        let mut cursor = vec![0u32; num_vertices + 1];
        let mut running = 0u32;
        for v in 0..num_vertices {
            let degree = offsets[v];
            offsets[v] = running;
            cursor[v] = running;
            running += degree;
        }
        offsets[num_vertices] = running;
        cursor[num_vertices] = running;
        debug_assert_eq!(running as usize, physical);

        let mut arcs = vec![ArcEntry::default(); physical];
        for &(u, v) in arcs_in {
            let mut out = ArcEntry::new(v, true, false);
            if !directed && build_incoming {
                out.set_backward();
            }
            arcs[cursor[u as usize] as usize] = out;
            cursor[u as usize] += 1;

            if both_endpoints {
                arcs[cursor[v as usize] as usize] =
                    ArcEntry::new(u, !directed, build_incoming);
                cursor[v as usize] += 1;
            }
        }

        let mut graph = CsrGraph::from_parts(offsets, arcs, directed);

        // The undirected scatter already yields direction-homogeneous
        // blocks; mixed flags only occur for directed graphs with
        // incoming arcs.
        if directed && build_incoming {
            for v in 0..num_vertices as VertexId {
                graph.sort_arcs(v);
            }
        }

        let errors = graph.consistency_errors();
        if errors != 0 {
            return Err(EngineError::Integrity(errors));
        }
        debug!(
            num_vertices = graph.num_vertices(),
            num_arcs = graph.num_arcs(),
            "graph.build.done"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directed_with_incoming_doubles_arcs() {
        let g = GraphBuilder::from_arc_list(3, &[(0, 1), (1, 2)], true, true).unwrap();
        assert_eq!(g.num_arcs(), 4);

        // Vertex 1 sees 2 forward (to 2) and 0 backward (from 0).
        let block = g.incident_arcs(1);
        assert_eq!(block.len(), 2);
        assert!(block[0].forward() && block[0].other() == 2);
        assert!(block[1].backward() && !block[1].forward() && block[1].other() == 0);
    }

    #[test]
    fn directed_without_incoming_keeps_logical_count() {
        let g = GraphBuilder::from_arc_list(3, &[(0, 1), (1, 2)], true, false).unwrap();
        assert_eq!(g.num_arcs(), 2);
        assert!(g.incident_arcs(1).iter().all(|a| a.forward()));
        assert!(g.incident_arcs(2).is_empty());
    }

    #[test]
    fn undirected_entries_carry_both_flags() {
        let g = GraphBuilder::from_arc_list(2, &[(0, 1)], false, true).unwrap();
        assert_eq!(g.num_arcs(), 2);
        for v in g.vertices() {
            let block = g.incident_arcs(v);
            assert_eq!(block.len(), 1);
            assert!(block[0].forward() && block[0].backward());
        }
    }

    #[test]
    fn offsets_are_monotone_with_sentinel() {
        let g = GraphBuilder::from_arc_list(5, &[(0, 4), (2, 1), (2, 3)], true, true).unwrap();
        let mut previous = 0;
        for v in g.vertices() {
            let len = g.incident_arcs(v).len();
            previous += len;
        }
        assert_eq!(previous, g.num_arcs());
        assert_eq!(g.consistency_errors(), 0);
    }

    #[test]
    fn out_of_range_endpoint_is_rejected() {
        assert!(GraphBuilder::from_arc_list(2, &[(0, 2)], true, true).is_err());
    }

    #[test]
    fn parallel_arcs_are_preserved() {
        let g = GraphBuilder::from_arc_list(2, &[(0, 1), (0, 1)], true, false).unwrap();
        assert_eq!(g.num_arcs(), 2);
    }
}
