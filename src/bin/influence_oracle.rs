//! Influence-estimation oracle driver: builds combined bottom-k
//! reachability sketches for a graph, then benchmarks estimated against
//! exact influence over random seed sets (or estimates every single
//! vertex with `--all-vertices`).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use riptide::graph::{self, IngestOptions};
use riptide::util::parse_index_ranges;
use riptide::{IcConfig, IcModel, InfluenceOracle, QueryConfig, Result, SeedMethod};

#[derive(Parser, Debug)]
#[command(
    name = "influence_oracle",
    version,
    about = "Sketch-based influence estimation under the IC model"
)]
struct Cli {
    #[arg(short = 'i', long, value_name = "PATH", help = "Graph input file")]
    input: PathBuf,

    #[arg(long, value_enum, default_value_t = FormatArg::Metis, help = "Graph input format")]
    format: FormatArg,

    #[arg(long, help = "Treat the input as an undirected graph")]
    undirected: bool,

    #[arg(long, help = "Remove parallel arcs from the input")]
    no_parallel_arcs: bool,

    #[arg(long, help = "Transpose (reverse) the input graph")]
    transpose: bool,

    #[arg(short = 'm', long, value_enum, default_value_t = ModelArg::Weighted, help = "IC model")]
    model: ModelArg,

    #[arg(
        short = 'p',
        long,
        default_value_t = 0.1,
        help = "Arc probability for the binary model"
    )]
    probability: f64,

    #[arg(
        short = 'N',
        long,
        default_value = "1-50",
        help = "Seed-set sizes, e.g. \"1-50,60,70-80\""
    )]
    seed_sizes: String,

    #[arg(short = 'g', long, value_enum, default_value_t = MethodArg::Uni, help = "Seed-set sampling method")]
    seed_method: MethodArg,

    #[arg(short = 'n', long, default_value_t = 100, help = "Queries per seed-set size")]
    queries: u32,

    #[arg(short = 'k', long, default_value_t = 64, help = "Bottom-k sketch size")]
    k: u16,

    #[arg(short = 'l', long, default_value_t = 64, help = "IC instances for preprocessing")]
    instances: u16,

    #[arg(long, help = "IC instances for exact evaluation (default: same as -l)")]
    eval_instances: Option<u16>,

    #[arg(long, default_value_t = 31_101_982, help = "Random seed")]
    seed: u32,

    #[arg(long, value_name = "PATH", help = "Write statistics to this file")]
    stats_out: Option<PathBuf>,

    #[arg(short = 'a', long, help = "Estimate the influence of every single vertex")]
    all_vertices: bool,

    #[arg(short = 'v', long, help = "Suppress console output")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Metis,
    Dimacs,
    Bin,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    Weighted,
    Binary,
    Trivalency,
}

impl From<ModelArg> for IcModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Weighted => IcModel::Weighted,
            ModelArg::Binary => IcModel::Binary,
            ModelArg::Trivalency => IcModel::Trivalency,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    Uni,
    Neigh,
}

impl From<MethodArg> for SeedMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Uni => SeedMethod::Uniform,
            MethodArg::Neigh => SeedMethod::Neighborhood,
        }
    }
}

fn init_tracing(quiet: bool) {
    let default_filter = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_graph(input: &Path, format: FormatArg, options: IngestOptions) -> Result<riptide::CsrGraph> {
    match format {
        FormatArg::Metis => graph::build_metis_graph(input, options),
        FormatArg::Dimacs => graph::build_dimacs_graph(input, options),
        FormatArg::Bin => graph::read_gr(input, options.build_incoming),
    }
}

fn run(cli: Cli) -> Result<()> {
    let options = IngestOptions {
        directed: !cli.undirected,
        transpose: cli.transpose,
        remove_parallel_arcs: cli.no_parallel_arcs,
        ..IngestOptions::default()
    };
    let seed_sizes = parse_index_ranges(&cli.seed_sizes)?;
    let graph = load_graph(&cli.input, cli.format, options)?;

    let ic = IcConfig {
        model: cli.model.into(),
        binary_probability: cli.probability,
        random_seed: cli.seed,
        num_instances: cli.instances,
    };
    let mut oracle = InfluenceOracle::new(&graph, ic, cli.k);
    oracle.preprocess();

    if cli.all_vertices {
        if let Some(path) = &cli.stats_out {
            let mut out = BufWriter::new(File::create(path)?);
            for v in graph.vertices() {
                writeln!(out, "{v}\t{}", oracle.estimate(&[v]))?;
            }
            out.flush()?;
        }
        return Ok(());
    }

    let config = QueryConfig {
        seed_sizes,
        method: cli.seed_method.into(),
        num_queries: cli.queries,
        eval_instances: cli.eval_instances.unwrap_or(cli.instances),
        stats_path: cli.stats_out.clone(),
    };
    oracle.run_queries(&config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("fatal: {error}");
            ExitCode::FAILURE
        }
    }
}
