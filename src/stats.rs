use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::skim::Seed;

/// Accumulates `key = value` lines and writes them in insertion order.
/// Both drivers dump their run statistics through this writer.
#[derive(Debug, Default)]
pub struct StatsWriter {
    lines: Vec<String>,
}

impl StatsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Display, value: impl Display) {
        self.lines.push(format!("{key} = {value}"));
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for line in &self.lines {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        info!(path = %path.display(), lines = self.lines.len(), "stats.written");
        Ok(())
    }
}

/// Writes the SKIM coverage trace: graph size, seed count, total elapsed
/// milliseconds, then one `vertex\tcumulative_influence\telapsed_ms` line
/// per seed.
pub fn write_coverage_trace(path: &Path, num_vertices: usize, seeds: &[Seed]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{num_vertices}")?;
    writeln!(out, "{}", seeds.len())?;
    let total_ms = seeds
        .last()
        .map(|s| s.sketch_ms + s.influence_ms)
        .unwrap_or(0.0);
    writeln!(out, "{total_ms}")?;

    let mut cumulative = 0.0;
    for seed in seeds {
        cumulative += seed.exact_influence;
        writeln!(
            out,
            "{}\t{}\t{}",
            seed.vertex,
            cumulative,
            seed.sketch_ms + seed.influence_ms
        )?;
    }
    out.flush()?;
    info!(path = %path.display(), seeds = seeds.len(), "stats.coverage_written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn writes_keys_in_insertion_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.txt");

        let mut stats = StatsWriter::new();
        stats.set("NumberOfVertices", 10);
        stats.set("0_SeedSetSize", 2);
        stats.set("AverageError", 0.25);
        stats.write_to(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "NumberOfVertices = 10\n0_SeedSetSize = 2\nAverageError = 0.25\n"
        );
    }

    #[test]
    fn coverage_trace_accumulates_influence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coverage.txt");
        let seeds = vec![
            Seed {
                vertex: 3,
                estimated_influence: 4.0,
                exact_influence: 3.5,
                sketch_ms: 1.0,
                influence_ms: 2.0,
            },
            Seed {
                vertex: 8,
                estimated_influence: 2.0,
                exact_influence: 1.5,
                sketch_ms: 2.0,
                influence_ms: 3.0,
            },
        ];
        write_coverage_trace(&path, 10, &seeds).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "10");
        assert_eq!(lines[1], "2");
        assert_eq!(lines[3], "3\t3.5\t3");
        assert_eq!(lines[4], "8\t5\t5");
    }
}
