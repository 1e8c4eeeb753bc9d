use tracing::debug;

use crate::graph::{CsrGraph, VertexId};

/// Integer probability resolution of the hash-based arc sampler.
pub const RESOLUTION: u32 = 3_000_000;

/// Independent Cascade arc-probability model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcModel {
    /// p(u, v) = 1 / in_degree(v).
    Weighted,
    /// Uniform constant probability.
    Binary,
    /// p(u, v) hash-picked from {0.1, 0.01, 0.001}.
    Trivalency,
}

/// IC model configuration shared by both drivers.
#[derive(Debug, Clone, Copy)]
pub struct IcConfig {
    pub model: IcModel,
    /// Arc probability for [`IcModel::Binary`].
    pub binary_probability: f64,
    /// Seed for the arc-presence hash and every derived RNG.
    pub random_seed: u32,
    /// Number of sampled IC instances.
    pub num_instances: u16,
}

impl Default for IcConfig {
    fn default() -> Self {
        Self {
            model: IcModel::Weighted,
            binary_probability: 0.1,
            random_seed: 31_101_982,
            num_instances: 64,
        }
    }
}

/// Deterministic per-instance arc-presence predicate.
///
/// No sampled edge set is ever stored: whether arc (u, v) exists in
/// instance i is recomputed from a tailored MurmurHash3 over
/// `(seed << 16 | l, u, v, i)`. Sketch construction and exact coverage
/// evaluation therefore see the same realization of every instance.
pub struct InstanceOracle {
    model: IcModel,
    hash_seed: u32,
    binary_threshold: u32,
    trivalency_thresholds: [u32; 3],
    in_degrees: Vec<u32>,
}

impl InstanceOracle {
    pub fn new(graph: &CsrGraph, config: &IcConfig) -> Self {
        // In-degrees count forward entries pointing at each head vertex;
        // for undirected graphs that is the full degree.
        let mut in_degrees = vec![0u32; graph.num_vertices()];
        for v in graph.vertices() {
            for arc in graph.incident_arcs(v) {
                if arc.forward() {
                    in_degrees[arc.other() as usize] += 1;
                }
            }
        }
        debug!(
            model = ?config.model,
            instances = config.num_instances,
            "ic.oracle.ready"
        );
        Self {
            model: config.model,
            hash_seed: config.random_seed.wrapping_shl(16) + u32::from(config.num_instances),
            binary_threshold: (config.binary_probability * f64::from(RESOLUTION)) as u32,
            trivalency_thresholds: [RESOLUTION / 10, RESOLUTION / 100, RESOLUTION / 1000],
            in_degrees,
        }
    }

    /// True iff the forward arc (u, v) is present in instance `i`.
    #[inline]
    pub fn contained(&self, u: VertexId, v: VertexId, i: u16) -> bool {
        let hash = self.hash(u, v, i);
        let drawn = hash % RESOLUTION;
        let threshold = match self.model {
            IcModel::Weighted => {
                let indeg = self.in_degrees[v as usize];
                debug_assert!(indeg > 0, "weighted model queried for an arcless head");
                RESOLUTION.min(RESOLUTION / indeg)
            }
            IcModel::Binary => self.binary_threshold,
            IcModel::Trivalency => self.trivalency_thresholds[(hash % 3) as usize],
        };
        drawn < threshold
    }

    /// MurmurHash3 32-bit finalization over the (u, v, i) triple with the
    /// configured seed word.
    #[inline]
    fn hash(&self, u: VertexId, v: VertexId, i: u16) -> u32 {
        const C1: u32 = 0xcc9e_2d51;
        const C2: u32 = 0x1b87_3593;

        let mut h = self.hash_seed;
        let mix = |h: &mut u32, value: u32, tail: bool| {
            let mut k = value.wrapping_mul(C1);
            k = k.rotate_left(15);
            k = k.wrapping_mul(C2);
            *h ^= k;
            if !tail {
                *h = h.rotate_left(13);
                *h = h.wrapping_mul(5).wrapping_add(0xe654_6b64);
            }
        };
        mix(&mut h, u, false);
        mix(&mut h, v, false);
        mix(&mut h, u32::from(i), true);

        h ^= 10; // input length in bytes
        h ^= h >> 16;
        h = h.wrapping_mul(0x85eb_ca6b);
        h ^= h >> 13;
        h = h.wrapping_mul(0xc2b2_ae35);
        h ^= h >> 16;
        h
    }
}
