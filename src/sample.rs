use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::container::FastSet;
use crate::graph::{CsrGraph, VertexId};

/// How benchmark seed sets are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMethod {
    /// Distinct vertices, uniform over the vertex domain.
    Uniform,
    /// Clustered seeds from a BFS neighborhood around a random arc tail.
    Neighborhood,
}

impl fmt::Display for SeedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedMethod::Uniform => write!(f, "uni"),
            SeedMethod::Neighborhood => write!(f, "neigh"),
        }
    }
}

/// Draws random seed sets for the estimator benchmark. The RNG state is
/// carried across calls, so a fixed seed yields a fixed query sequence.
pub struct SeedSampler<'g> {
    graph: &'g CsrGraph,
    method: SeedMethod,
    rng: ChaCha8Rng,
    search: FastSet,
    levels: Vec<u32>,
}

impl<'g> SeedSampler<'g> {
    pub fn new(graph: &'g CsrGraph, method: SeedMethod, rng_seed: u64) -> Self {
        Self {
            graph,
            method,
            rng: ChaCha8Rng::seed_from_u64(rng_seed),
            search: FastSet::new(graph.num_vertices()),
            levels: vec![u32::MAX; graph.num_vertices()],
        }
    }

    /// Draws a seed set of `n` vertices (clamped to the graph size for
    /// the uniform method).
    pub fn generate(&mut self, n: usize) -> Vec<VertexId> {
        match self.method {
            SeedMethod::Uniform => self.generate_uniform(n),
            SeedMethod::Neighborhood => self.generate_neighborhood(n),
        }
    }

    fn generate_uniform(&mut self, n: usize) -> Vec<VertexId> {
        let n = n.min(self.graph.num_vertices());
        self.search.clear();
        while self.search.len() < n {
            let v = self.rng.gen_range(0..self.graph.num_vertices()) as VertexId;
            self.search.insert(v);
        }
        self.search.keys().to_vec()
    }

    /// Samples an arc with a backward flag, BFSes forward from its tail
    /// until the frontier can satisfy the remaining demand, truncates the
    /// frontier to the last completed level, and samples from it without
    /// replacement. Repeats until `n` seeds are collected.
    fn generate_neighborhood(&mut self, n: usize) -> Vec<VertexId> {
        if self.graph.num_arcs() == 0 {
            return self.generate_uniform(n);
        }
        let mut seeds = Vec::with_capacity(n);
        while seeds.len() < n {
            let source = self.sample_backward_arc_tail();

            self.search.clear();
            self.search.insert(source);
            self.levels[source as usize] = 0;
            let mut cursor = 0;
            let mut final_level = u32::MAX;
            while cursor < self.search.len() {
                let u = self.search.key_by_index(cursor);
                cursor += 1;
                if self.levels[u as usize] > final_level {
                    break;
                }
                if cursor >= n - seeds.len() {
                    final_level = self.levels[u as usize];
                }
                if self.levels[u as usize] == final_level {
                    continue;
                }
                for arc in self.graph.incident_arcs(u) {
                    if !arc.forward() {
                        continue;
                    }
                    let v = arc.other();
                    if self.search.contains(v) {
                        continue;
                    }
                    self.levels[v as usize] = self.levels[u as usize] + 1;
                    self.search.insert(v);
                }
            }

            for index in 0..self.search.len() {
                self.levels[self.search.key_by_index(index) as usize] = u32::MAX;
            }
            // Drop everything the scan did not complete.
            while self.search.len() > cursor {
                self.search.delete_back();
            }
            while seeds.len() < n && !self.search.is_empty() {
                let index = self.rng.gen_range(0..self.search.len());
                seeds.push(self.search.delete_by_index(index));
            }
        }
        seeds
    }

    fn sample_backward_arc_tail(&mut self) -> VertexId {
        loop {
            let arc_id = self.rng.gen_range(0..self.graph.num_arcs());
            let arc = self.graph.arcs()[arc_id];
            if arc.backward() {
                return arc.other();
            }
        }
    }
}
