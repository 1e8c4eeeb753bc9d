mod estimator;

use std::path::PathBuf;
use std::time::Instant;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::container::FastSet;
use crate::error::Result;
use crate::graph::{CsrGraph, VertexId};
use crate::ic::{IcConfig, InstanceOracle};
use crate::sample::{SeedMethod, SeedSampler};
use crate::stats::StatsWriter;

/// Query-benchmark configuration for the oracle driver.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Seed-set sizes to benchmark.
    pub seed_sizes: Vec<usize>,
    pub method: SeedMethod,
    /// Queries per seed-set size.
    pub num_queries: u32,
    /// Instances for the exact reference run.
    pub eval_instances: u16,
    pub stats_path: Option<PathBuf>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            seed_sizes: (1..=50).collect(),
            method: SeedMethod::Uniform,
            num_queries: 100,
            eval_instances: 64,
            stats_path: None,
        }
    }
}

/// Influence-estimation oracle over combined bottom-k reachability
/// sketches.
///
/// Preprocessing assigns every (vertex, instance) pair a unique rank by a
/// random permutation of `[0, n·l)` and grows, per vertex, the k smallest
/// ranks whose pair reverse-reaches it. A query then merges the seed
/// sketches and converts surviving ranks into an influence estimate in
/// time proportional to the seed set, not the graph.
pub struct InfluenceOracle<'g> {
    graph: &'g CsrGraph,
    ic: IcConfig,
    oracle: InstanceOracle,
    k: u16,
    sketches: Vec<Vec<u64>>,
    preprocessing_ms: f64,
}

impl<'g> InfluenceOracle<'g> {
    pub fn new(graph: &'g CsrGraph, ic: IcConfig, k: u16) -> Self {
        Self {
            graph,
            oracle: InstanceOracle::new(graph, &ic),
            ic,
            k,
            sketches: Vec::new(),
            preprocessing_ms: 0.0,
        }
    }

    /// The rank value just past every assignable rank; doubles as the τ of
    /// unsaturated sketches.
    fn sentinel_rank(&self) -> u64 {
        self.graph.num_vertices() as u64 * u64::from(self.ic.num_instances)
    }

    pub fn sketches(&self) -> &[Vec<u64>] {
        &self.sketches
    }

    pub fn total_sketch_entries(&self) -> u64 {
        self.sketches.iter().map(|s| s.len() as u64).sum()
    }

    /// Builds the combined bottom-k sketches over all instances.
    pub fn preprocess(&mut self) {
        let n = self.graph.num_vertices();
        let l = self.ic.num_instances;
        let started = Instant::now();

        // One global rank order over all (vertex, instance) pairs.
        let mut permutation: Vec<u64> = (0..self.sentinel_rank()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(u64::from(self.ic.random_seed));
        permutation.shuffle(&mut rng);

        let mut instance_ranks: Vec<Vec<(u64, VertexId)>> = vec![Vec::new(); usize::from(l)];
        for (rank, &pair) in permutation.iter().enumerate() {
            let instance = (pair / n as u64) as usize;
            let source = (pair % n as u64) as VertexId;
            instance_ranks[instance].push((rank as u64, source));
        }
        drop(permutation);

        self.sketches = vec![Vec::new(); n];
        let mut locals: Vec<Vec<u64>> = vec![Vec::new(); n];
        let mut search = FastSet::new(n);

        for (instance, ranks) in instance_ranks.iter().enumerate() {
            let i = instance as u16;
            for &(rank, source) in ranks {
                self.reverse_bfs_collect(source, i, rank, &mut locals, &mut search);
            }
            self.merge_locals(&mut locals);
            debug!(instance, "oracle.preprocess.instance");
        }

        self.preprocessing_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(
            num_vertices = n,
            instances = l,
            k = self.k,
            entries = self.total_sketch_entries(),
            elapsed_ms = self.preprocessing_ms,
            "oracle.preprocess.done"
        );
    }

    /// Reverse BFS from `source` in instance `i`, appending `rank` to the
    /// local sketch of every visited vertex whose sketch is still short of
    /// k. A full local sketch prunes the search at that vertex.
    fn reverse_bfs_collect(
        &self,
        source: VertexId,
        i: u16,
        rank: u64,
        locals: &mut [Vec<u64>],
        search: &mut FastSet,
    ) {
        search.clear();
        search.insert(source);
        let mut index = 0;
        while index < search.len() {
            let u = search.key_by_index(index);
            index += 1;

            let local = &mut locals[u as usize];
            if local.len() >= self.k as usize {
                continue;
            }
            // Ranks arrive in ascending order, so pushing keeps the
            // sketch sorted.
            local.push(rank);

            for arc in self.graph.incident_arcs(u).iter().rev() {
                if !arc.backward() {
                    break;
                }
                let v = arc.other();
                if self.oracle.contained(v, u, i) && !search.contains(v) {
                    search.insert(v);
                }
            }
        }
    }

    /// Sorted set-union of each local sketch into the combined one,
    /// truncated back to the k smallest.
    fn merge_locals(&mut self, locals: &mut [Vec<u64>]) {
        let k = self.k as usize;
        for (sketch, local) in self.sketches.iter_mut().zip(locals.iter_mut()) {
            if local.is_empty() {
                continue;
            }
            let mut merged = Vec::with_capacity((sketch.len() + local.len()).min(k));
            let (mut i, mut j) = (0, 0);
            while merged.len() < k && (i < sketch.len() || j < local.len()) {
                let take_local = match (sketch.get(i), local.get(j)) {
                    (Some(&a), Some(&b)) => b < a,
                    (None, Some(_)) => true,
                    _ => false,
                };
                if take_local {
                    merged.push(local[j]);
                    j += 1;
                } else {
                    merged.push(sketch[i]);
                    i += 1;
                }
            }
            *sketch = merged;
            local.clear();
        }
    }

    /// Estimated influence of `seeds` from the precomputed sketches.
    pub fn estimate(&self, seeds: &[VertexId]) -> f64 {
        if seeds.is_empty() {
            return 0.0;
        }
        let sentinel = self.sentinel_rank();
        let lists = seeds
            .iter()
            .map(|&s| estimator::tagged_ranks(&self.sketches[s as usize], self.k, sentinel))
            .collect();
        estimator::merge_and_sum(lists, sentinel) * self.graph.num_vertices() as f64
    }

    /// Monte-Carlo reference: multi-source forward BFS over `l_eval` fresh
    /// instances (a different hash family than the preprocessing
    /// instances whenever `l_eval != l`).
    pub fn compute_influence(&self, seeds: &[VertexId], l_eval: u16) -> f64 {
        if l_eval == 0 {
            return 0.0;
        }
        let eval_oracle = InstanceOracle::new(
            self.graph,
            &IcConfig {
                num_instances: l_eval,
                ..self.ic
            },
        );
        let mut search = FastSet::new(self.graph.num_vertices());
        let mut reached = 0u64;
        for i in 0..l_eval {
            search.clear();
            for &s in seeds {
                search.insert(s);
            }
            let mut index = 0;
            while index < search.len() {
                let u = search.key_by_index(index);
                index += 1;
                reached += 1;
                for arc in self.graph.incident_arcs(u) {
                    if !arc.forward() {
                        break;
                    }
                    let v = arc.other();
                    if eval_oracle.contained(u, v, i) && !search.contains(v) {
                        search.insert(v);
                    }
                }
            }
        }
        reached as f64 / f64::from(l_eval)
    }

    /// Random-query benchmark: for every configured seed-set size, draw
    /// `num_queries` seed sets, compare the estimator against the exact
    /// reference, and optionally dump per-query and per-size statistics.
    pub fn run_queries(&self, config: &QueryConfig) -> Result<()> {
        let mut sampler = SeedSampler::new(
            self.graph,
            config.method,
            u64::from(self.ic.random_seed),
        );
        let mut stats = StatsWriter::new();
        stats.set("NumberOfVertices", self.graph.num_vertices());
        stats.set("NumberOfArcs", self.graph.num_arcs());
        stats.set("PreprocessingElapsedMilliseconds", self.preprocessing_ms);
        stats.set("NumberOfQueries", config.num_queries);
        stats.set("SeedGenerator", config.method);
        stats.set("TotalSketchesSize", self.total_sketch_entries());
        stats.set(
            "TotalSketchesBytes",
            self.total_sketch_entries() * std::mem::size_of::<u64>() as u64,
        );
        stats.set("NumberOfSeedSetSizes", config.seed_sizes.len());

        for (size_index, &size) in config.seed_sizes.iter().enumerate() {
            let size = size.min(self.graph.num_vertices());
            stats.set(format!("{size_index}_SeedSetSize"), size);

            let mut sum_error = 0.0;
            let mut sum_estimated = 0.0;
            let mut sum_exact = 0.0;
            let mut sum_estimator_ms = 0.0;
            let mut sum_exact_ms = 0.0;

            for query in 0..config.num_queries {
                let seeds = sampler.generate(size);

                let started = Instant::now();
                let estimated = self.estimate(&seeds);
                let estimator_ms = started.elapsed().as_secs_f64() * 1000.0;

                let started = Instant::now();
                let exact = self.compute_influence(&seeds, config.eval_instances);
                let exact_ms = started.elapsed().as_secs_f64() * 1000.0;

                let error = (estimated - exact).abs() / exact;
                sum_error += error;
                sum_estimated += estimated;
                sum_exact += exact;
                sum_estimator_ms += estimator_ms;
                sum_exact_ms += exact_ms;

                if config.stats_path.is_some() {
                    let ids: Vec<String> = seeds.iter().map(|s| s.to_string()).collect();
                    let prefix = format!("{size_index}_{query}");
                    stats.set(format!("{prefix}_VertexIds"), ids.join(","));
                    stats.set(format!("{prefix}_EstimatedInfluence"), estimated);
                    stats.set(format!("{prefix}_ExactInfluence"), exact);
                    stats.set(format!("{prefix}_Error"), error);
                    stats.set(format!("{prefix}_EstimatorElapsedMilliseconds"), estimator_ms);
                    stats.set(format!("{prefix}_ExactElapsedMilliseconds"), exact_ms);
                }
            }

            let queries = f64::from(config.num_queries);
            info!(
                size,
                avg_estimated = sum_estimated / queries,
                avg_exact = sum_exact / queries,
                avg_error = sum_error / queries,
                "oracle.queries.size_done"
            );
            stats.set(
                format!("{size_index}_AverageEstimatedInfluence"),
                sum_estimated / queries,
            );
            stats.set(
                format!("{size_index}_AverageExactInfluence"),
                sum_exact / queries,
            );
            stats.set(format!("{size_index}_AverageError"), sum_error / queries);
            stats.set(
                format!("{size_index}_AverageEstimatorElapsedMilliseconds"),
                sum_estimator_ms / queries,
            );
            stats.set(
                format!("{size_index}_AverageExactElapsedMilliseconds"),
                sum_exact_ms / queries,
            );
        }

        if let Some(path) = &config.stats_path {
            stats.write_to(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::GraphBuilder;
    use crate::ic::IcModel;

    use super::*;

    fn line_graph() -> CsrGraph {
        GraphBuilder::from_arc_list(5, &[(0, 1), (1, 2), (2, 3), (3, 4)], true, true).unwrap()
    }

    fn binary_config(p: f64, l: u16) -> IcConfig {
        IcConfig {
            model: IcModel::Binary,
            binary_probability: p,
            random_seed: 7,
            num_instances: l,
        }
    }

    #[test]
    fn sketches_are_sorted_and_bounded() {
        let graph = line_graph();
        let mut oracle = InfluenceOracle::new(&graph, binary_config(1.0, 3), 2);
        oracle.preprocess();
        for sketch in oracle.sketches() {
            assert!(sketch.len() <= 2);
            assert!(sketch.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn ranks_are_unique_across_sketch_build() {
        // With k >= n * l no rank is ever truncated away, so the union of
        // all certain-arc sketches enumerates each rank exactly once per
        // reachable vertex; vertex 4 reaches only itself.
        let graph = line_graph();
        let mut oracle = InfluenceOracle::new(&graph, binary_config(1.0, 1), 8);
        oracle.preprocess();
        assert_eq!(oracle.sketches()[4].len(), 1);
        // Vertex 0 reaches everything: 5 distinct ranks.
        let sketch = &oracle.sketches()[0];
        assert_eq!(sketch.len(), 5);
        assert!(sketch.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn estimator_is_exact_on_certain_line_graph() {
        let graph = line_graph();
        let mut oracle = InfluenceOracle::new(&graph, binary_config(1.0, 1), 4);
        oracle.preprocess();
        // Vertex 0 reaches all 5 vertices; the 4 smallest of 5 permuted
        // ranks are always {0, 1, 2, 3}, so tau = 3 and the estimate is
        // n * 3 * (1/3) = 5, independent of the permutation drawn.
        let estimate = oracle.estimate(&[0]);
        assert!((estimate - 5.0).abs() < 1e-9);
    }

    #[test]
    fn empty_seed_set_estimates_zero() {
        let graph = line_graph();
        let mut oracle = InfluenceOracle::new(&graph, binary_config(1.0, 1), 4);
        oracle.preprocess();
        assert_eq!(oracle.estimate(&[]), 0.0);
    }

    #[test]
    fn exact_influence_counts_reachable_vertices() {
        let graph = line_graph();
        let oracle = InfluenceOracle::new(&graph, binary_config(1.0, 2), 4);
        assert!((oracle.compute_influence(&[0], 2) - 5.0).abs() < 1e-9);
        assert!((oracle.compute_influence(&[4], 2) - 1.0).abs() < 1e-9);
        assert!((oracle.compute_influence(&[3, 4], 2) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn preprocessing_is_deterministic() {
        let graph = line_graph();
        let mut a = InfluenceOracle::new(&graph, binary_config(0.5, 4), 3);
        let mut b = InfluenceOracle::new(&graph, binary_config(0.5, 4), 3);
        a.preprocess();
        b.preprocess();
        assert_eq!(a.sketches(), b.sketches());
    }
}
