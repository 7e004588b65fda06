//! semgrav CLI: semantic gravity mapping pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use semgrav::builder::{build_statistics, sample_paths};
use semgrav::config::PipelineConfig;
use semgrav::export::{ExportBundle, write_bundle_json, write_edge_csv};
use semgrav::infer::HttpEngine;
use semgrav::paths::SemgravPaths;
use semgrav::pipeline::Pipeline;
use semgrav::scorer::{EdgeSortKey, top_edges, weight_statistics};
use semgrav::seeds::SeedCorpus;
use semgrav::store::CheckpointStore;

#[derive(Parser)]
#[command(name = "semgrav", version, about = "Semantic gravity mapper")]
struct Cli {
    /// Checkpoint directory (defaults to the XDG state dir).
    #[arg(long, global = true)]
    checkpoint_dir: Option<PathBuf>,

    /// Config file (defaults to the XDG config file; missing file = defaults).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// External seed corpus TOML (defaults to the bundled corpus).
    #[arg(long, global = true)]
    seeds: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Phase 1: build the association graph by BFS expansion.
    Build {
        /// Start fresh, ignoring any phase-1 checkpoint.
        #[arg(long)]
        no_resume: bool,
    },

    /// Phase 2: score graph edges with logprob-derived weights.
    Score {
        /// Start fresh, ignoring any phase-2 checkpoint.
        #[arg(long)]
        no_resume: bool,
    },

    /// Phase 3: analyze the weighted graph and print the report.
    Analyze {
        /// Also write the full JSON report to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run all three phases back to back.
    Run {
        /// Start every phase fresh, ignoring checkpoints.
        #[arg(long)]
        no_resume: bool,

        /// Write the final JSON bundle to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show statistics for the latest built (and scored, if any) graph.
    Stats,

    /// Export the latest graph.
    Export {
        #[command(subcommand)]
        action: ExportAction,
    },

    /// Inspect or delete checkpoints.
    Checkpoints {
        #[command(subcommand)]
        action: CheckpointAction,
    },

    /// List the seed corpus.
    Seeds,
}

#[derive(Subcommand)]
enum ExportAction {
    /// Lossless JSON bundle (graph + analysis).
    Json {
        #[arg(long)]
        output: PathBuf,
    },
    /// source,target,weight CSV edge list.
    Csv {
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum CheckpointAction {
    /// List stored checkpoints.
    List {
        /// Restrict to one phase.
        #[arg(long)]
        phase: Option<u8>,
    },
    /// Delete one checkpoint, or a whole phase.
    Delete {
        #[arg(long)]
        phase: u8,
        /// Iteration to delete; omit to delete every checkpoint of the phase.
        #[arg(long)]
        iteration: Option<u64>,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let paths = SemgravPaths::resolve().into_diagnostic()?;
    paths.ensure_dirs().into_diagnostic()?;

    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let config = PipelineConfig::load_or_default(&config_path).into_diagnostic()?;

    let seeds = match &cli.seeds {
        Some(path) => SeedCorpus::from_path(path).into_diagnostic()?,
        None => SeedCorpus::bundled().into_diagnostic()?,
    };

    let checkpoint_dir = cli
        .checkpoint_dir
        .clone()
        .unwrap_or_else(|| paths.checkpoints_dir());
    let store = CheckpointStore::open(&checkpoint_dir).into_diagnostic()?;

    let engine = Arc::new(HttpEngine::new((&config.engine).into()));
    let pipeline = Pipeline::new(engine, store, seeds, config);

    match cli.command {
        Commands::Build { no_resume } => {
            let graph = pipeline.build(!no_resume).into_diagnostic()?;
            let (_, visited) = pipeline.load_built_graph().into_diagnostic()?;
            let stats = build_statistics(&graph, visited);
            println!(
                "built graph: {} nodes, {} edges, {} words expanded (avg out-degree {:.2}, max {})",
                stats.nodes, stats.edges, stats.visited, stats.avg_out_degree, stats.max_out_degree
            );
            println!("\nsample association paths:");
            for path in sample_paths(&graph, &pipeline.seeds().all_seeds(), 5, 4) {
                println!("  {}", path.join(" -> "));
            }
        }

        Commands::Score { no_resume } => {
            let (graph, _) = pipeline.load_built_graph().into_diagnostic()?;
            let graph = pipeline.score(graph, !no_resume).into_diagnostic()?;
            let stats = weight_statistics(&graph);
            println!(
                "scored {} edges: mean weight {:.3}, median {:.3}, min {:.3}, max {:.3}",
                stats.scored_edges, stats.mean, stats.median, stats.min, stats.max
            );
            println!("\nstrongest associations:");
            for (source, target, weight) in top_edges(&graph, 10, EdgeSortKey::Weight) {
                println!("  {source} -> {target}: {weight:.3}");
            }
        }

        Commands::Analyze { output } => {
            let graph = pipeline.load_scored_graph().into_diagnostic()?;
            let analysis = pipeline.analyze(&graph);
            println!("{analysis}");
            if let Some(path) = output {
                let bundle = ExportBundle::new(&graph, analysis);
                write_bundle_json(&path, &bundle).into_diagnostic()?;
                println!("report written to {}", path.display());
            }
        }

        Commands::Run { no_resume, output } => {
            let (graph, analysis) = pipeline.run(!no_resume).into_diagnostic()?;
            println!("{analysis}");
            if let Some(path) = output {
                let bundle = ExportBundle::new(&graph, analysis);
                write_bundle_json(&path, &bundle).into_diagnostic()?;
                println!("bundle written to {}", path.display());
            }
        }

        Commands::Stats => {
            let (graph, visited) = pipeline.load_built_graph().into_diagnostic()?;
            let stats = build_statistics(&graph, visited);
            println!(
                "graph: {} nodes, {} edges, {} words expanded",
                stats.nodes, stats.edges, stats.visited
            );
            println!(
                "out-degree: avg {:.2}, max {}",
                stats.avg_out_degree, stats.max_out_degree
            );
            if let Ok(scored) = pipeline.load_scored_graph() {
                let ws = weight_statistics(&scored);
                println!(
                    "weights: {} scored, mean {:.3}, std {:.3}",
                    ws.scored_edges, ws.mean, ws.std_dev
                );
            }
        }

        Commands::Export { action } => {
            // Prefer the scored graph; fall back to the raw built graph.
            let graph = match pipeline.load_scored_graph() {
                Ok(g) => g,
                Err(_) => pipeline.load_built_graph().into_diagnostic()?.0,
            };
            match action {
                ExportAction::Json { output } => {
                    let analysis = pipeline.analyze(&graph);
                    let bundle = ExportBundle::new(&graph, analysis);
                    write_bundle_json(&output, &bundle).into_diagnostic()?;
                    println!("bundle written to {}", output.display());
                }
                ExportAction::Csv { output } => {
                    write_edge_csv(&output, &graph).into_diagnostic()?;
                    println!("edge list written to {}", output.display());
                }
            }
        }

        Commands::Checkpoints { action } => match action {
            CheckpointAction::List { phase } => {
                let metas = pipeline.store().list(phase).into_diagnostic()?;
                if metas.is_empty() {
                    println!("no checkpoints");
                }
                for meta in metas {
                    let iteration = match meta.iteration {
                        Some(n) => format!("iteration {n}"),
                        None => "final".to_string(),
                    };
                    println!(
                        "phase {} {:16} ts {}  {}",
                        meta.phase,
                        iteration,
                        meta.timestamp,
                        meta.path.display()
                    );
                }
            }
            CheckpointAction::Delete { phase, iteration } => {
                pipeline
                    .store()
                    .delete(phase, iteration)
                    .into_diagnostic()?;
                println!("deleted");
            }
        },

        Commands::Seeds => {
            for domain in pipeline.seeds().domains() {
                println!("{}:", domain.name);
                println!("  {}", domain.words.join(", "));
            }
            println!("\n{} seeds total", pipeline.seeds().seed_count());
        }
    }

    Ok(())
}
