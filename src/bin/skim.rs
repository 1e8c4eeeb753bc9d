//! SKIM driver: greedily computes a maximum-influence seed set from
//! reverse-reachability sketch sizes, with per-instance forward BFS
//! evaluation of every selected seed.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use riptide::graph::{self, IngestOptions};
use riptide::stats::{write_coverage_trace, StatsWriter};
use riptide::{IcConfig, IcModel, Result, Skim, SkimConfig};

#[derive(Parser, Debug)]
#[command(
    name = "skim",
    version,
    about = "Sketch-based influence maximization under the IC model"
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
        default_value_t = 0,
        help = "Number of seeds to compute (0 = graph size)"
    )]
    num_seeds: u32,

    #[arg(short = 'k', long, default_value_t = 64, help = "Bottom-k sketch size")]
    k: u16,

    #[arg(short = 'l', long, default_value_t = 64, help = "IC instances")]
    instances: u16,

    #[arg(
        long,
        default_value_t = 0,
        help = "IC instances for a final exact evaluation (0 = off)"
    )]
    eval_instances: u16,

    #[arg(short = 't', long, default_value_t = 1, help = "Evaluation threads")]
    threads: usize,

    #[arg(long, default_value_t = 31_101_982, help = "Random seed")]
    seed: u32,

    #[arg(long, value_name = "PATH", help = "Write statistics to this file")]
    stats_out: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Write a coverage trace to this file")]
    coverage_out: Option<PathBuf>,

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
    let graph = load_graph(&cli.input, cli.format, options)?;

    let ic = IcConfig {
        model: cli.model.into(),
        binary_probability: cli.probability,
        random_seed: cli.seed,
        num_instances: cli.instances,
    };
    let config = SkimConfig {
        num_seeds: cli.num_seeds,
        k: cli.k,
        num_threads: cli.threads,
        eval_instances: cli.eval_instances,
    };
    let report = Skim::new(&graph, ic, config).run()?;

    if let Some(path) = &cli.stats_out {
        let mut stats = StatsWriter::new();
        stats.set("NumberOfVertices", graph.num_vertices());
        stats.set("NumberOfArcs", graph.num_arcs() / 2);
        stats.set("TotalEstimatedInfluence", report.total_estimated_influence);
        stats.set("TotalExactInfluence", report.total_exact_influence);
        stats.set("TotalElapsedMilliseconds", report.total_ms);
        stats.set("SketchBuildingElapsedMilliseconds", report.sketch_ms);
        stats.set("InfluenceComputationElapsedMilliseconds", report.influence_ms);
        stats.set("NumberOfRanksUsed", report.ranks_used);
        stats.set("NumberOfSeedVertices", report.seeds.len());
        stats.set("RankComputationMethod", "shuffle");
        stats.set(
            "NumberOfPermutationsComputed",
            report.permutations_computed,
        );

        let mut cumulative_estimated = 0.0;
        let mut cumulative_exact = 0.0;
        for (index, seed) in report.seeds.iter().enumerate() {
            cumulative_estimated += seed.estimated_influence;
            cumulative_exact += seed.exact_influence;
            stats.set(
                format!("{index}_MarginalEstimatedInfluence"),
                seed.estimated_influence,
            );
            stats.set(
                format!("{index}_CumulativeEstimatedInfluence"),
                cumulative_estimated,
            );
            stats.set(
                format!("{index}_MarginalExactInfluence"),
                seed.exact_influence,
            );
            stats.set(format!("{index}_CumulativeExactInfluence"), cumulative_exact);
            stats.set(format!("{index}_VertexId"), seed.vertex);
            stats.set(
                format!("{index}_TotalElapsedMilliseconds"),
                seed.sketch_ms + seed.influence_ms,
            );
            stats.set(
                format!("{index}_SketchBuildingElapsedMilliseconds"),
                seed.sketch_ms,
            );
            stats.set(
                format!("{index}_InfluenceComputationElapsedMilliseconds"),
                seed.influence_ms,
            );
        }
        stats.write_to(path)?;
    }

    if let Some(path) = &cli.coverage_out {
        write_coverage_trace(path, graph.num_vertices(), &report.seeds)?;
    }

    if !cli.quiet {
        let n = graph.num_vertices().max(1) as f64;
        println!("Seed vertices computed: {}", report.seeds.len());
        println!("Ranks used: {}", report.ranks_used);
        println!(
            "Estimated spread: {:.2} ({:.2} %)",
            report.total_estimated_influence,
            100.0 * report.total_estimated_influence / n
        );
        println!(
            "Exact spread: {:.2} ({:.2} %)",
            report.total_exact_influence,
            100.0 * report.total_exact_influence / n
        );
        println!("Total time: {:.1} ms", report.total_ms);
    }
    Ok(())
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
