use std::collections::HashMap;
use std::time::Instant;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::container::FastSet;
use crate::error::{EngineError, Result};
use crate::graph::{CsrGraph, VertexId};
use crate::ic::{IcConfig, InstanceOracle};

/// SKIM run configuration.
#[derive(Debug, Clone, Copy)]
pub struct SkimConfig {
    /// Seeds to compute; 0 means one per vertex.
    pub num_seeds: u32,
    /// Sketch saturation threshold.
    pub k: u16,
    /// Instances the evaluation phase is parallelized over.
    pub num_threads: usize,
    /// Instances for the final exact re-evaluation; 0 disables it.
    pub eval_instances: u16,
}

impl Default for SkimConfig {
    fn default() -> Self {
        Self {
            num_seeds: 0,
            k: 64,
            num_threads: 1,
            eval_instances: 0,
        }
    }
}

/// One selected seed vertex with its influence estimates and the
/// cumulative phase timings at selection time.
#[derive(Debug, Clone, PartialEq)]
pub struct Seed {
    pub vertex: VertexId,
    /// Marginal influence estimated from the sketch that saturated.
    pub estimated_influence: f64,
    /// Marginal influence measured by the evaluation BFS.
    pub exact_influence: f64,
    pub sketch_ms: f64,
    pub influence_ms: f64,
}

/// Result of a SKIM run.
#[derive(Debug, Clone, Default)]
pub struct SkimReport {
    pub seeds: Vec<Seed>,
    pub ranks_used: u64,
    pub permutations_computed: u32,
    pub total_estimated_influence: f64,
    pub total_exact_influence: f64,
    pub sketch_ms: f64,
    pub influence_ms: f64,
    pub total_ms: f64,
}

/// Sketch-based influence maximization.
///
/// Seeds are selected greedily: reverse-reachability sketches grow rank by
/// rank until some vertex's sketch saturates at k (that vertex has the
/// highest estimated marginal influence), then a forward BFS per instance
/// measures the seed's exact coverage and invalidates every sketch entry
/// the newly covered pairs contributed.
pub struct Skim<'g> {
    graph: &'g CsrGraph,
    ic: IcConfig,
    oracle: InstanceOracle,
    config: SkimConfig,
}

/// Working state of one run, shared by the phase methods.
struct RunState {
    rng: ChaCha8Rng,
    permutation: Vec<VertexId>,
    permutations_computed: u32,
    rank: u64,
    /// Rank sketch sizes; the full sketches are never materialized here,
    /// only their sizes and inverses matter to the greedy loop.
    sketch_sizes: Vec<u16>,
    /// For a processed (source, instance) pair, the vertices whose sketch
    /// holds that pair's rank.
    inv_sketches: HashMap<(VertexId, u16), Vec<VertexId>>,
    covered: Vec<Vec<bool>>,
    processed: Vec<Vec<bool>>,
    search: FastSet,
    /// Saturation-fallback buckets by sketch size, with per-vertex
    /// positions for O(1) swap-removal.
    buckets: Vec<Vec<VertexId>>,
    bucket_positions: Vec<u32>,
    bucket_top: u16,
    saturated: bool,
}

struct Candidate {
    vertex: VertexId,
    estimated_influence: f64,
}

impl<'g> Skim<'g> {
    pub fn new(graph: &'g CsrGraph, ic: IcConfig, config: SkimConfig) -> Self {
        Self {
            graph,
            oracle: InstanceOracle::new(graph, &ic),
            ic,
            config,
        }
    }

    pub fn run(&self) -> Result<SkimReport> {
        let n = self.graph.num_vertices();
        let l = self.ic.num_instances;
        let mut report = SkimReport::default();
        if n == 0 || l == 0 {
            return Ok(report);
        }
        let num_seeds = match self.config.num_seeds {
            0 => n,
            requested => (requested as usize).min(n),
        };

        let pool = if self.config.num_threads > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.config.num_threads)
                    .build()
                    .map_err(|e| EngineError::InvalidArgument(format!("thread pool: {e}")))?,
            )
        } else {
            None
        };

        let mut state = RunState {
            rng: ChaCha8Rng::seed_from_u64(u64::from(self.ic.random_seed)),
            permutation: Vec::new(),
            permutations_computed: 0,
            rank: 0,
            sketch_sizes: vec![0; n],
            inv_sketches: HashMap::new(),
            covered: vec![vec![false; n]; usize::from(l)],
            processed: vec![vec![false; n]; usize::from(l)],
            search: FastSet::new(n),
            buckets: Vec::new(),
            bucket_positions: Vec::new(),
            bucket_top: 0,
            saturated: false,
        };

        let global_timer = Instant::now();
        while report.seeds.len() < num_seeds {
            let timer = Instant::now();
            let mut candidate = None;
            if !state.saturated {
                candidate = self.grow_sketches(&mut state);
                if candidate.is_none() {
                    info!(
                        seeds = report.seeds.len(),
                        rank = state.rank,
                        "skim.saturated"
                    );
                    self.build_buckets(&mut state);
                }
            }
            if state.saturated {
                candidate = Self::pop_fullest_bucket(&mut state, u64::from(l));
                if candidate.is_none() {
                    info!(seeds = report.seeds.len(), "skim.total_coverage");
                    break;
                }
            }
            let candidate = candidate.expect("either phase produced a seed");
            report.sketch_ms += timer.elapsed().as_secs_f64() * 1000.0;

            let timer = Instant::now();
            let exact = self.evaluate_candidate(&mut state, candidate.vertex, pool.as_ref());
            report.influence_ms += timer.elapsed().as_secs_f64() * 1000.0;

            debug!(
                vertex = candidate.vertex,
                estimated = candidate.estimated_influence,
                exact,
                rank = state.rank,
                "skim.seed"
            );
            report.total_estimated_influence += candidate.estimated_influence;
            report.total_exact_influence += exact;
            report.seeds.push(Seed {
                vertex: candidate.vertex,
                estimated_influence: candidate.estimated_influence,
                exact_influence: exact,
                sketch_ms: report.sketch_ms,
                influence_ms: report.influence_ms,
            });
        }
        report.total_ms = global_timer.elapsed().as_secs_f64() * 1000.0;
        report.ranks_used = state.rank;
        report.permutations_computed = state.permutations_computed;

        // The in-loop exact influences are marginal against the shared
        // coverage; an explicit evaluation pass re-measures the seed
        // sequence on fresh instances.
        if self.config.eval_instances != 0 {
            report.total_exact_influence =
                self.reevaluate_seeds(&mut report.seeds, self.config.eval_instances);
        }

        info!(
            seeds = report.seeds.len(),
            ranks = report.ranks_used,
            permutations = report.permutations_computed,
            estimated = report.total_estimated_influence,
            exact = report.total_exact_influence,
            total_ms = report.total_ms,
            "skim.done"
        );
        Ok(report)
    }

    /// Grow phase: consume ranks until some sketch saturates at k. Returns
    /// the saturating vertex, or None when the rank space is exhausted.
    fn grow_sketches(&self, state: &mut RunState) -> Option<Candidate> {
        let n = self.graph.num_vertices();
        let l = self.ic.num_instances;
        let nl = n as u64 * u64::from(l);
        let k = self.config.k;
        // Rejection-sampling the instance gets slow once most instances
        // are consumed; past this many epochs the pick enumerates the
        // survivors instead.
        let enumerate_after = u32::from(l) - (u32::from(l) / 10 + 1);

        while state.rank < nl {
            let position = (state.rank % n as u64) as usize;
            if position == 0 {
                if state.permutation.len() != n {
                    state.permutation = (0..n as VertexId).collect();
                }
                state.permutation.shuffle(&mut state.rng);
                state.permutations_computed += 1;
            }
            let source = state.permutation[position];

            let instance = if state.permutations_computed < enumerate_after {
                loop {
                    let i = state.rng.gen_range(0..l);
                    if !state.processed[usize::from(i)][source as usize] {
                        break i;
                    }
                }
            } else {
                let remaining = u16::try_from(
                    u32::from(l) - state.permutations_computed + 1,
                )
                .expect("epoch count bounded by instance count");
                let mut skip = state.rng.gen_range(0..l) % remaining;
                let mut chosen = 0;
                for i in 0..l {
                    if !state.processed[usize::from(i)][source as usize] {
                        if skip == 0 {
                            chosen = i;
                            break;
                        }
                        skip -= 1;
                    }
                }
                chosen
            };
            state.processed[usize::from(instance)][source as usize] = true;
            state.rank += 1;

            // A covered source still consumed its rank; the estimate
            // denominator below counts such skips.
            if state.covered[usize::from(instance)][source as usize] {
                continue;
            }

            let covered = &state.covered[usize::from(instance)];
            let inv_sketch = state.inv_sketches.entry((source, instance)).or_default();
            state.search.clear();
            state.search.insert(source);
            let mut index = 0;
            while index < state.search.len() {
                let u = state.search.key_by_index(index);
                index += 1;
                state.sketch_sizes[u as usize] += 1;
                inv_sketch.push(u);

                if state.sketch_sizes[u as usize] == k {
                    return Some(Candidate {
                        vertex: u,
                        estimated_influence: f64::from(k - 1) * n as f64 / state.rank as f64,
                    });
                }

                for arc in self.graph.incident_arcs(u).iter().rev() {
                    if !arc.backward() {
                        break;
                    }
                    let v = arc.other();
                    if self.oracle.contained(v, u, instance)
                        && !covered[v as usize]
                        && !state.search.contains(v)
                    {
                        state.search.insert(v);
                    }
                }
            }
        }
        None
    }

    /// Buckets every vertex with a non-empty sketch by its current size.
    fn build_buckets(&self, state: &mut RunState) {
        let n = self.graph.num_vertices();
        state.buckets = vec![Vec::new(); usize::from(self.config.k)];
        state.bucket_positions = vec![0; n];
        let mut bucketed = 0usize;
        for u in 0..n {
            let size = state.sketch_sizes[u];
            if size > 0 {
                state.bucket_positions[u] = state.buckets[usize::from(size)].len() as u32;
                state.buckets[usize::from(size)].push(u as VertexId);
                state.bucket_top = state.bucket_top.max(size);
                bucketed += 1;
            }
        }
        debug!(vertices = bucketed, "skim.buckets_built");
        state.saturated = true;
    }

    /// Fallback selection from the highest non-empty bucket. None means
    /// every remaining sketch is empty, i.e. total coverage.
    fn pop_fullest_bucket(state: &mut RunState, l: u64) -> Option<Candidate> {
        while state.bucket_top > 0 && state.buckets[usize::from(state.bucket_top)].is_empty() {
            state.bucket_top -= 1;
        }
        if state.bucket_top == 0 {
            return None;
        }
        let vertex = *state.buckets[usize::from(state.bucket_top)]
            .last()
            .expect("top bucket non-empty");
        Some(Candidate {
            vertex,
            estimated_influence: f64::from(state.sketch_sizes[vertex as usize]) / l as f64,
        })
    }

    /// Evaluation phase: forward BFS from the seed in every instance,
    /// marking coverage and draining the inverse sketches of every newly
    /// covered pair. Returns the seed's exact marginal influence.
    fn evaluate_candidate(
        &self,
        state: &mut RunState,
        seed: VertexId,
        pool: Option<&rayon::ThreadPool>,
    ) -> f64 {
        let n = self.graph.num_vertices();
        let inv_sketches = &state.inv_sketches;

        // (covered count, inverse-sketch hits) per instance. Workers only
        // touch their own instance's coverage row and a private search
        // set; sketch bookkeeping happens after the join.
        let results: Vec<(u64, Vec<VertexId>)> = match pool {
            Some(pool) => pool.install(|| {
                state
                    .covered
                    .par_iter_mut()
                    .enumerate()
                    .map_init(
                        || FastSet::new(n),
                        |search, (i, coverage)| {
                            self.cover_instance(seed, i as u16, coverage, search, inv_sketches)
                        },
                    )
                    .collect()
            }),
            None => {
                let search = &mut state.search;
                state
                    .covered
                    .iter_mut()
                    .enumerate()
                    .map(|(i, coverage)| {
                        self.cover_instance(seed, i as u16, coverage, search, inv_sketches)
                    })
                    .collect()
            }
        };

        let mut newly_covered = 0u64;
        for (i, (count, hits)) in results.into_iter().enumerate() {
            newly_covered += count;
            for u in hits {
                let inv_sketch = state
                    .inv_sketches
                    .remove(&(u, i as u16))
                    .expect("queued hit has an inverse sketch");
                for v in inv_sketch {
                    if state.saturated {
                        Self::drop_from_bucket(state, v);
                    }
                    state.sketch_sizes[v as usize] -= 1;
                }
            }
        }
        newly_covered as f64 / f64::from(self.ic.num_instances)
    }

    /// Forward BFS from `seed` in one instance. Newly covered vertices
    /// with an inverse sketch are queued for the post-join drain.
    fn cover_instance(
        &self,
        seed: VertexId,
        i: u16,
        coverage: &mut [bool],
        search: &mut FastSet,
        inv_sketches: &HashMap<(VertexId, u16), Vec<VertexId>>,
    ) -> (u64, Vec<VertexId>) {
        search.clear();
        let mut hits = Vec::new();
        let mut count = 0u64;
        if !coverage[seed as usize] {
            search.insert(seed);
        }
        let mut index = 0;
        while index < search.len() {
            let u = search.key_by_index(index);
            index += 1;
            coverage[u as usize] = true;
            count += 1;

            if inv_sketches.contains_key(&(u, i)) {
                hits.push(u);
            }

            for arc in self.graph.incident_arcs(u) {
                if !arc.forward() {
                    break;
                }
                let v = arc.other();
                if self.oracle.contained(u, v, i)
                    && !search.contains(v)
                    && !coverage[v as usize]
                {
                    search.insert(v);
                }
            }
        }
        (count, hits)
    }

    /// Moves `v` one bucket down (reading its pre-decrement size), or out
    /// of the bucket structure when its sketch is about to empty.
    fn drop_from_bucket(state: &mut RunState, v: VertexId) {
        let size = usize::from(state.sketch_sizes[v as usize]);
        let bucket = &mut state.buckets[size];
        let position = state.bucket_positions[v as usize] as usize;
        let last = *bucket.last().expect("vertex is bucketed");
        state.bucket_positions[last as usize] = position as u32;
        bucket.swap_remove(position);
        if size > 1 {
            state.bucket_positions[v as usize] = state.buckets[size - 1].len() as u32;
            state.buckets[size - 1].push(v);
        }
    }

    /// Re-runs the whole seed sequence on `l_eval` instances, rewriting
    /// each seed's exact influence as its marginal coverage there.
    fn reevaluate_seeds(&self, seeds: &mut [Seed], l_eval: u16) -> f64 {
        let n = self.graph.num_vertices();
        let eval_oracle = InstanceOracle::new(
            self.graph,
            &IcConfig {
                num_instances: l_eval,
                ..self.ic
            },
        );
        let mut marked = vec![vec![false; n]; usize::from(l_eval)];
        let mut search = FastSet::new(n);
        let mut total = 0.0;

        for seed in seeds {
            let mut reached = 0u64;
            for i in 0..l_eval {
                let marks = &mut marked[usize::from(i)];
                if marks[seed.vertex as usize] {
                    continue;
                }
                search.clear();
                search.insert(seed.vertex);
                let mut index = 0;
                while index < search.len() {
                    let u = search.key_by_index(index);
                    index += 1;
                    marks[u as usize] = true;
                    reached += 1;
                    for arc in self.graph.incident_arcs(u) {
                        if !arc.forward() {
                            break;
                        }
                        let v = arc.other();
                        if eval_oracle.contained(u, v, i)
                            && !marks[v as usize]
                            && !search.contains(v)
                        {
                            search.insert(v);
                        }
                    }
                }
            }
            seed.exact_influence = reached as f64 / f64::from(l_eval);
            total += seed.exact_influence;
        }
        debug!(total, instances = l_eval, "skim.reevaluated");
        total
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::GraphBuilder;
    use crate::ic::IcModel;

    use super::*;

    /// Timing-free view of the selected seeds.
    fn selection(report: &SkimReport) -> Vec<(VertexId, f64, f64)> {
        report
            .seeds
            .iter()
            .map(|s| (s.vertex, s.estimated_influence, s.exact_influence))
            .collect()
    }

    fn certain_binary(l: u16) -> IcConfig {
        IcConfig {
            model: IcModel::Binary,
            binary_probability: 1.0,
            random_seed: 7,
            num_instances: l,
        }
    }

    fn two_triangles() -> CsrGraph {
        // Two strongly connected K3 components: {0, 1, 2} and {3, 4, 5}.
        let arcs = [
            (0, 1),
            (1, 2),
            (2, 0),
            (1, 0),
            (2, 1),
            (0, 2),
            (3, 4),
            (4, 5),
            (5, 3),
            (4, 3),
            (5, 4),
            (3, 5),
        ];
        GraphBuilder::from_arc_list(6, &arcs, true, true).unwrap()
    }

    #[test]
    fn disconnected_components_get_one_seed_each() {
        let graph = two_triangles();
        let skim = Skim::new(
            &graph,
            certain_binary(1),
            SkimConfig {
                num_seeds: 2,
                k: 64,
                ..SkimConfig::default()
            },
        );
        let report = skim.run().unwrap();
        assert_eq!(report.seeds.len(), 2);
        let sides: Vec<bool> = report.seeds.iter().map(|s| s.vertex < 3).collect();
        assert_ne!(sides[0], sides[1], "seeds must split across components");
        for seed in &report.seeds {
            assert!((seed.exact_influence - 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn complete_graph_saturates_with_full_sketches() {
        // K4 with certain arcs: every vertex reaches every vertex, so all
        // 16 (vertex, instance) ranks land in every sketch and the first
        // seed covers the graph exactly.
        let arcs: Vec<(VertexId, VertexId)> = (0..4)
            .flat_map(|u| (0..4).filter(move |&v| v != u).map(move |v| (u, v)))
            .collect();
        let graph = GraphBuilder::from_arc_list(4, &arcs, true, true).unwrap();
        let skim = Skim::new(
            &graph,
            certain_binary(4),
            SkimConfig {
                num_seeds: 4,
                k: 64,
                ..SkimConfig::default()
            },
        );
        let report = skim.run().unwrap();
        assert_eq!(report.seeds.len(), 1, "one seed covers everything");
        assert!((report.seeds[0].estimated_influence - 4.0).abs() < 1e-9);
        assert!((report.seeds[0].exact_influence - 4.0).abs() < 1e-9);
    }

    #[test]
    fn seed_count_is_clamped_to_graph_size() {
        let graph = two_triangles();
        let skim = Skim::new(
            &graph,
            certain_binary(1),
            SkimConfig {
                num_seeds: 100,
                k: 64,
                ..SkimConfig::default()
            },
        );
        let report = skim.run().unwrap();
        assert!(report.seeds.len() <= 6);
    }

    #[test]
    fn runs_are_deterministic() {
        let graph = two_triangles();
        let config = SkimConfig {
            num_seeds: 3,
            k: 4,
            ..SkimConfig::default()
        };
        let ic = IcConfig {
            model: IcModel::Binary,
            binary_probability: 0.6,
            random_seed: 99,
            num_instances: 8,
        };
        let a = Skim::new(&graph, ic, config).run().unwrap();
        let b = Skim::new(&graph, ic, config).run().unwrap();
        assert_eq!(selection(&a), selection(&b));
        assert_eq!(a.ranks_used, b.ranks_used);
    }

    #[test]
    fn parallel_evaluation_matches_sequential() {
        let graph = two_triangles();
        let ic = IcConfig {
            model: IcModel::Binary,
            binary_probability: 0.7,
            random_seed: 13,
            num_instances: 8,
        };
        let sequential = Skim::new(
            &graph,
            ic,
            SkimConfig {
                num_seeds: 4,
                k: 8,
                num_threads: 1,
                ..SkimConfig::default()
            },
        )
        .run()
        .unwrap();
        let parallel = Skim::new(
            &graph,
            ic,
            SkimConfig {
                num_seeds: 4,
                k: 8,
                num_threads: 4,
                ..SkimConfig::default()
            },
        )
        .run()
        .unwrap();
        assert_eq!(selection(&sequential), selection(&parallel));
    }

    #[test]
    fn coverage_is_monotone_in_estimates() {
        // Greedy marginal gains: every later seed's exact influence is
        // bounded by the graph size and the totals add up.
        let graph = two_triangles();
        let skim = Skim::new(
            &graph,
            certain_binary(2),
            SkimConfig {
                num_seeds: 6,
                k: 4,
                ..SkimConfig::default()
            },
        );
        let report = skim.run().unwrap();
        let sum: f64 = report.seeds.iter().map(|s| s.exact_influence).sum();
        assert!((sum - report.total_exact_influence).abs() < 1e-9);
        assert!(sum <= 6.0 + 1e-9);
    }

    #[test]
    fn empty_graph_yields_no_seeds() {
        let graph = GraphBuilder::from_arc_list(0, &[], true, true).unwrap();
        let skim = Skim::new(&graph, certain_binary(2), SkimConfig::default());
        let report = skim.run().unwrap();
        assert!(report.seeds.is_empty());
    }
}
