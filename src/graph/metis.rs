use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{EngineError, Result};

use super::{dedup_arc_list, CsrGraph, GraphBuilder, IngestOptions, VertexId};

/// Reads a METIS adjacency file into a CSR graph.
///
/// The first non-comment, non-empty line is `n m [...]`; line `t` of the
/// body lists the 1-based neighbors of vertex `t - 1`. `%`-prefixed lines
/// are comments.
pub fn build_metis_graph(path: &Path, options: IngestOptions) -> Result<CsrGraph> {
    let (num_vertices, arcs) = parse_metis(path, options)?;
    info!(
        path = %path.display(),
        num_vertices,
        arcs = arcs.len(),
        "graph.ingest.metis"
    );
    GraphBuilder::from_arc_list(num_vertices, &arcs, options.directed, options.build_incoming)
}

/// Converts a METIS file to the `.gr` binary format, applying the same
/// ingest options as [`build_metis_graph`].
pub fn stream_metis_to_gr(input: &Path, output: &Path, options: IngestOptions) -> Result<()> {
    let (num_vertices, arcs) = parse_metis(input, options)?;
    super::write_gr(output, num_vertices, &arcs, options.directed)
}

fn parse_metis(path: &Path, options: IngestOptions) -> Result<(usize, Vec<(VertexId, VertexId)>)> {
    let reader = BufReader::new(File::open(path)?);

    let mut num_vertices = 0usize;
    let mut header_parsed = false;
    let mut from: VertexId = 0;
    let mut arcs = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index as u64 + 1;
        let line = line?;
        if line.starts_with('%') {
            continue;
        }

        if !header_parsed {
            if line.trim().is_empty() {
                continue;
            }
            let mut tokens = line.split_ascii_whitespace();
            num_vertices = tokens
                .next()
                .ok_or_else(|| EngineError::parse(path, line_number, "missing vertex count"))?
                .parse()
                .map_err(|_| EngineError::parse(path, line_number, "bad vertex count"))?;
            if tokens.next().is_none() {
                return Err(EngineError::parse(path, line_number, "missing arc count"));
            }
            header_parsed = true;
            continue;
        }

        for token in line.split_ascii_whitespace() {
            let neighbor: u64 = token
                .parse()
                .map_err(|_| EngineError::parse(path, line_number, format!("bad vertex id {token:?}")))?;
            if neighbor == 0 || neighbor as usize > num_vertices {
                return Err(EngineError::parse(
                    path,
                    line_number,
                    format!("vertex id {neighbor} outside [1, {num_vertices}]"),
                ));
            }
            let to = (neighbor - 1) as VertexId;
            if from as usize >= num_vertices {
                return Err(EngineError::parse(
                    path,
                    line_number,
                    "more adjacency lines than vertices",
                ));
            }
            if options.ignore_self_loops && from == to {
                continue;
            }
            push_arc(&mut arcs, from, to, options);
        }
        // Adjacency lines are consecutive; an empty line is a vertex with
        // no neighbors.
        from += 1;
    }

    if !header_parsed {
        return Err(EngineError::parse(path, 0, "missing METIS header"));
    }

    if options.remove_parallel_arcs {
        let before = arcs.len();
        dedup_arc_list(&mut arcs);
        debug!(removed = before - arcs.len(), "graph.ingest.dedup");
    }

    Ok((num_vertices, arcs))
}

pub(super) fn push_arc(
    arcs: &mut Vec<(VertexId, VertexId)>,
    from: VertexId,
    to: VertexId,
    options: IngestOptions,
) {
    let (tail, head) = if options.transpose { (to, from) } else { (from, to) };
    // Undirected inputs list every edge twice; keep the tail <= head copy.
    if options.directed || tail <= head {
        arcs.push((tail, head));
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn metis_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn parses_directed_adjacency() {
        let file = metis_file("% a comment\n3 3\n2 3\n3\n\n");
        let g = build_metis_graph(file.path(), IngestOptions::default()).unwrap();
        assert_eq!(g.num_vertices(), 3);
        // Arcs 0->1, 0->2, 1->2, each materialized at both endpoints.
        assert_eq!(g.num_arcs(), 6);
    }

    #[test]
    fn self_loops_are_dropped_when_requested() {
        let with_loop = metis_file("2 2\n1 2\n\n");
        let without = metis_file("2 1\n2\n\n");
        let a = build_metis_graph(with_loop.path(), IngestOptions::default()).unwrap();
        let b = build_metis_graph(without.path(), IngestOptions::default()).unwrap();
        assert_eq!(a.num_arcs(), b.num_arcs());
        assert_eq!(a.arcs(), b.arcs());
    }

    #[test]
    fn transpose_reverses_arcs() {
        let file = metis_file("2 1\n2\n\n");
        let options = IngestOptions {
            transpose: true,
            ..IngestOptions::default()
        };
        let g = build_metis_graph(file.path(), options).unwrap();
        assert!(g.incident_arcs(1).iter().any(|a| a.forward() && a.other() == 0));
        assert!(g.incident_arcs(0).iter().all(|a| !a.forward()));
    }

    #[test]
    fn out_of_range_neighbor_is_a_parse_error() {
        let file = metis_file("2 1\n5\n\n");
        assert!(build_metis_graph(file.path(), IngestOptions::default()).is_err());
    }

    #[test]
    fn missing_header_is_a_parse_error() {
        let file = metis_file("% only comments\n");
        assert!(build_metis_graph(file.path(), IngestOptions::default()).is_err());
    }
}
