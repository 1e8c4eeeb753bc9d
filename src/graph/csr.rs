use tracing::warn;

use super::{ArcEntry, VertexId};

/// Immutable compressed-adjacency graph with direction-flagged arcs.
///
/// `offsets` has `num_vertices + 1` entries; vertex `v`'s incident arcs are
/// `arcs[offsets[v] .. offsets[v + 1]]`. When incoming arcs were built,
/// every logical arc appears twice (once per endpoint), so `num_arcs` is
/// the physical entry count, not the logical one.
#[derive(Debug, Clone)]
pub struct CsrGraph {
    offsets: Vec<u32>,
    arcs: Vec<ArcEntry>,
    directed: bool,
}

impl CsrGraph {
    pub(super) fn from_parts(offsets: Vec<u32>, arcs: Vec<ArcEntry>, directed: bool) -> Self {
        debug_assert!(!offsets.is_empty());
        Self {
            offsets,
            arcs,
            directed,
        }
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    pub fn num_arcs(&self) -> usize {
        self.arcs.len()
    }

    #[inline]
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn is_empty(&self) -> bool {
        self.num_vertices() == 0
    }

    #[inline]
    pub fn degree(&self, v: VertexId) -> usize {
        (self.offsets[v as usize + 1] - self.offsets[v as usize]) as usize
    }

    /// All arc entries incident to `v`, sorted forward-first.
    #[inline]
    pub fn incident_arcs(&self, v: VertexId) -> &[ArcEntry] {
        let lo = self.offsets[v as usize] as usize;
        let hi = self.offsets[v as usize + 1] as usize;
        &self.arcs[lo..hi]
    }

    pub fn arcs(&self) -> &[ArcEntry] {
        &self.arcs
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexId> {
        0..self.num_vertices() as VertexId
    }

    /// Restores the direction-bucketed arc order for one vertex block.
    pub fn sort_arcs(&mut self, v: VertexId) {
        let lo = self.offsets[v as usize] as usize;
        let hi = self.offsets[v as usize + 1] as usize;
        self.arcs[lo..hi].sort();
    }

    /// Counts violations of the structural invariants. Run by the builder
    /// before any traversal sees the graph; anything non-zero is fatal.
    pub fn consistency_errors(&self) -> usize {
        let mut errors = 0;
        let num_arcs = self.arcs.len() as u64;

        for v in 0..self.num_vertices() {
            let first = self.offsets[v] as u64;
            if first > num_arcs {
                warn!(vertex = v, first_arc = first, "graph.check.offset_out_of_range");
                errors += 1;
            }
            if self.offsets[v + 1] < self.offsets[v] {
                warn!(vertex = v, "graph.check.offset_not_monotone");
                errors += 1;
            }
        }
        let sentinel = self.offsets[self.num_vertices()];
        if u64::from(sentinel) != num_arcs {
            warn!(sentinel, num_arcs, "graph.check.sentinel_mismatch");
            errors += 1;
        }

        for (id, arc) in self.arcs.iter().enumerate() {
            if arc.other() as usize >= self.num_vertices() {
                warn!(arc = id, other = arc.other(), "graph.check.endpoint_out_of_range");
                errors += 1;
            }
            if !arc.is_valid() {
                warn!(arc = id, "graph.check.flagless_arc");
                errors += 1;
            }
        }

        let self_loops = self
            .vertices()
            .flat_map(|v| self.incident_arcs(v).iter().filter(move |a| a.other() == v))
            .count();
        if self_loops > 0 {
            warn!(count = self_loops, "graph.check.self_loops");
        }

        errors
    }
}
