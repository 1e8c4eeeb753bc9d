use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::info;

use crate::error::{EngineError, Result};

use super::{CsrGraph, GraphBuilder, VertexId};

/// Magic number opening every `.gr` file.
pub const GR_MAGIC: u32 = 0x1234_1234;

const TAG_VERTEX_META: u8 = 0;
const TAG_ARC_META: u8 = 1;
const TAG_ARC: u8 = 2;

/// `.gr` file header, stored packed little-endian in field order
/// (45 bytes on disk).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrHeader {
    pub directed: bool,
    pub num_vertices: u64,
    pub num_arcs: u64,
    pub graph_meta_size: u64,
    pub vertex_meta_size: u64,
    pub arc_meta_size: u64,
}

impl GrHeader {
    const BYTES: usize = 4 + 1 + 5 * 8;

    fn write_to(&self, out: &mut impl Write) -> Result<()> {
        out.write_all(&GR_MAGIC.to_le_bytes())?;
        out.write_all(&[self.directed as u8])?;
        for word in [
            self.num_vertices,
            self.num_arcs,
            self.graph_meta_size,
            self.vertex_meta_size,
            self.arc_meta_size,
        ] {
            out.write_all(&word.to_le_bytes())?;
        }
        Ok(())
    }

    fn read_from(input: &mut impl Read, path: &Path) -> Result<Self> {
        let mut buf = [0u8; Self::BYTES];
        input
            .read_exact(&mut buf)
            .map_err(|_| corrupt(path, 0, "truncated header"))?;
        let magic = u32::from_le_bytes(buf[0..4].try_into().expect("header slice"));
        if magic != GR_MAGIC {
            return Err(corrupt(path, 0, format!("bad magic number {magic:#010x}")));
        }
        let word = |i: usize| {
            u64::from_le_bytes(buf[5 + i * 8..13 + i * 8].try_into().expect("header slice"))
        };
        Ok(Self {
            directed: buf[4] != 0,
            num_vertices: word(0),
            num_arcs: word(1),
            graph_meta_size: word(2),
            vertex_meta_size: word(3),
            arc_meta_size: word(4),
        })
    }
}

/// Writes a graph's logical arc list in `.gr` form: the packed header
/// followed by tagged arc records (no metadata is emitted).
pub fn write_gr(
    path: &Path,
    num_vertices: usize,
    arcs: &[(VertexId, VertexId)],
    directed: bool,
) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    let header = GrHeader {
        directed,
        num_vertices: num_vertices as u64,
        num_arcs: arcs.len() as u64,
        graph_meta_size: 0,
        vertex_meta_size: 0,
        arc_meta_size: 0,
    };
    header.write_to(&mut out)?;
    for &(from, to) in arcs {
        out.write_all(&[TAG_ARC])?;
        out.write_all(&from.to_le_bytes())?;
        out.write_all(&to.to_le_bytes())?;
    }
    out.flush()?;
    info!(path = %path.display(), arcs = arcs.len(), "graph.gr.written");
    Ok(())
}

/// Reads a `.gr` file back into a CSR graph. Metadata records are skipped
/// using the sizes recorded in the header; an unknown record tag is fatal
/// and reported with its byte offset.
pub fn read_gr(path: &Path, build_incoming: bool) -> Result<CsrGraph> {
    let (header, arcs) = read_gr_arcs(path)?;
    info!(
        path = %path.display(),
        num_vertices = header.num_vertices,
        arcs = arcs.len(),
        directed = header.directed,
        "graph.ingest.gr"
    );
    GraphBuilder::from_arc_list(
        header.num_vertices as usize,
        &arcs,
        header.directed,
        build_incoming,
    )
}

/// Reads the header and raw arc list of a `.gr` file.
pub fn read_gr_arcs(path: &Path) -> Result<(GrHeader, Vec<(VertexId, VertexId)>)> {
    let mut input = BufReader::new(File::open(path)?);
    let header = GrHeader::read_from(&mut input, path)?;

    let mut arcs = Vec::with_capacity(header.num_arcs as usize);
    let mut offset = GrHeader::BYTES as u64;
    let mut tag = [0u8; 1];
    while arcs.len() < header.num_arcs as usize {
        if input.read_exact(&mut tag).is_err() {
            return Err(corrupt(
                path,
                offset,
                format!("expected {} arcs, found {}", header.num_arcs, arcs.len()),
            ));
        }
        offset += 1;
        match tag[0] {
            TAG_ARC => {
                let mut record = [0u8; 8];
                input
                    .read_exact(&mut record)
                    .map_err(|_| corrupt(path, offset, "truncated arc record"))?;
                let from = u32::from_le_bytes(record[0..4].try_into().expect("arc slice"));
                let to = u32::from_le_bytes(record[4..8].try_into().expect("arc slice"));
                skip(&mut input, header.arc_meta_size, path, offset)?;
                offset += 8 + header.arc_meta_size;
                arcs.push((from, to));
            }
            TAG_VERTEX_META => {
                skip(&mut input, header.vertex_meta_size, path, offset)?;
                offset += header.vertex_meta_size;
            }
            TAG_ARC_META => {
                skip(&mut input, header.arc_meta_size, path, offset)?;
                offset += header.arc_meta_size;
            }
            other => {
                return Err(corrupt(
                    path,
                    offset - 1,
                    format!("unknown entity tag {other}"),
                ));
            }
        }
    }
    Ok((header, arcs))
}

fn skip(input: &mut impl Read, bytes: u64, path: &Path, offset: u64) -> Result<()> {
    if bytes == 0 {
        return Ok(());
    }
    let copied = std::io::copy(&mut input.take(bytes), &mut std::io::sink())?;
    if copied != bytes {
        return Err(corrupt(path, offset, "truncated metadata record"));
    }
    Ok(())
}

fn corrupt(path: &Path, offset: u64, message: impl Into<String>) -> EngineError {
    EngineError::CorruptFile {
        path: path.to_path_buf(),
        offset,
        message: message.into(),
    }
}
