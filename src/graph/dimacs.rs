use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{EngineError, Result};

use super::metis::push_arc;
use super::{dedup_arc_list, CsrGraph, GraphBuilder, IngestOptions, VertexId};

/// Reads a DIMACS shortest-path file into a CSR graph.
///
/// `c`- and `%`-prefixed lines are comments; the `p`-header carries the
/// vertex and arc counts as its third and fourth tokens; arc lines are
/// `a <from> <to> <weight>` with 1-based ids (weights are ignored).
pub fn build_dimacs_graph(path: &Path, options: IngestOptions) -> Result<CsrGraph> {
    let reader = BufReader::new(File::open(path)?);

    let mut num_vertices = 0usize;
    let mut expected_arcs = 0usize;
    let mut header_parsed = false;
    let mut self_loops_ignored = 0usize;
    let mut arcs: Vec<(VertexId, VertexId)> = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index as u64 + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('c') || trimmed.starts_with('%') {
            continue;
        }

        let tokens: Vec<&str> = trimmed.split_ascii_whitespace().collect();
        if !header_parsed {
            if tokens.len() < 4 {
                return Err(EngineError::parse(path, line_number, "short DIMACS header"));
            }
            num_vertices = tokens[2]
                .parse()
                .map_err(|_| EngineError::parse(path, line_number, "bad vertex count"))?;
            expected_arcs = tokens[3]
                .parse()
                .map_err(|_| EngineError::parse(path, line_number, "bad arc count"))?;
            header_parsed = true;
            continue;
        }

        if tokens.len() < 4 || tokens[0] != "a" {
            return Err(EngineError::parse(
                path,
                line_number,
                format!("expected an arc line, got {trimmed:?}"),
            ));
        }
        let from = parse_vertex(tokens[1], num_vertices, path, line_number)?;
        let to = parse_vertex(tokens[2], num_vertices, path, line_number)?;

        if options.ignore_self_loops && from == to {
            self_loops_ignored += 1;
            continue;
        }
        push_arc(&mut arcs, from, to, options);
    }

    if !header_parsed {
        return Err(EngineError::parse(path, 0, "missing DIMACS header"));
    }
    debug!(
        parsed = arcs.len(),
        expected = expected_arcs,
        self_loops_ignored,
        "graph.ingest.dimacs.arcs"
    );

    if options.remove_parallel_arcs {
        let before = arcs.len();
        dedup_arc_list(&mut arcs);
        debug!(removed = before - arcs.len(), "graph.ingest.dedup");
    }

    info!(
        path = %path.display(),
        num_vertices,
        arcs = arcs.len(),
        "graph.ingest.dimacs"
    );
    GraphBuilder::from_arc_list(num_vertices, &arcs, options.directed, options.build_incoming)
}

fn parse_vertex(token: &str, num_vertices: usize, path: &Path, line: u64) -> Result<VertexId> {
    let id: u64 = token
        .parse()
        .map_err(|_| EngineError::parse(path, line, format!("bad vertex id {token:?}")))?;
    if id == 0 || id as usize > num_vertices {
        return Err(EngineError::parse(
            path,
            line,
            format!("vertex id {id} outside [1, {num_vertices}]"),
        ));
    }
    Ok((id - 1) as VertexId)
}
