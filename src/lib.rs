pub mod container;
pub mod error;
pub mod graph;
pub mod ic;
pub mod oracle;
pub mod sample;
pub mod skim;
pub mod stats;
pub mod util;

pub use crate::error::{EngineError, Result};
pub use crate::graph::{ArcEntry, CsrGraph, GraphBuilder, VertexId};
pub use crate::ic::{IcConfig, IcModel, InstanceOracle};
pub use crate::oracle::{InfluenceOracle, QueryConfig};
pub use crate::sample::{SeedMethod, SeedSampler};
pub use crate::skim::{Seed, Skim, SkimConfig};
