//! ideagraph CLI: build knowledge graphs and mine subgraphs from them.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use ideagraph::config::Config;
use ideagraph::engine::{default_embedder, Engine};
use ideagraph::mine::{self, Method};
use ideagraph::store::{read_triples, Snapshot};

#[derive(Parser)]
#[command(name = "ideagraph", version, about = "Knowledge graph builder and subgraph miner")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a graph snapshot from a JSON or JSON Lines file of triples.
    Build {
        /// Input triples.
        #[arg(long)]
        input: PathBuf,

        /// Snapshot to write (`.json` for JSON, anything else for bincode).
        #[arg(long)]
        output: PathBuf,

        /// Merge threshold for entity resolution.
        #[arg(long)]
        similarity_threshold: Option<f32>,

        /// Ingest at most this many triples.
        #[arg(long)]
        max_items: Option<usize>,
    },

    /// Mine subgraphs from a snapshot.
    Extract {
        /// Graph snapshot.
        #[arg(long)]
        graph: PathBuf,

        /// random_walk or two_nodes.
        #[arg(long)]
        method: Option<Method>,

        /// Number of subgraphs to mine.
        #[arg(long, default_value = "1")]
        count: usize,

        #[arg(long)]
        max_nodes: Option<usize>,

        #[arg(long)]
        max_steps: Option<usize>,

        /// Base RNG seed; subgraph i uses seed + i.
        #[arg(long)]
        seed: Option<u64>,

        /// Start node (walk seed for random_walk).
        #[arg(long)]
        start: Option<String>,

        /// End node (two_nodes only).
        #[arg(long)]
        end: Option<String>,

        /// Directory for `*.subgraph.json` documents.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Show snapshot statistics.
    Info {
        /// Graph snapshot.
        #[arg(long)]
        graph: PathBuf,
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

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Build {
            input,
            output,
            similarity_threshold,
            max_items,
        } => {
            if let Some(t) = similarity_threshold {
                config.engine.similarity_threshold = t;
            }
            if max_items.is_some() {
                config.engine.max_items = max_items;
            }
            config.validate()?;

            let triples = read_triples(&input)?;
            let mut engine = Engine::new(config.engine)?;
            let report = engine.ingest_all(&triples);
            engine.save(&output)?;

            println!("{report}");
            println!("Wrote {}", output.display());
            println!("{}", engine.info());
        }

        Commands::Extract {
            graph,
            method,
            count,
            max_nodes,
            max_steps,
            seed,
            start,
            end,
            output_dir,
        } => {
            let miner = &mut config.miner;
            if let Some(m) = method {
                miner.method = m;
            }
            if let Some(n) = max_nodes {
                miner.max_nodes = n;
            }
            if let Some(s) = max_steps {
                miner.max_steps = s;
            }
            if let Some(s) = seed {
                miner.rng_seed = s;
            }
            config.validate()?;
            if count == 0 {
                miette::bail!("--count must be at least 1");
            }

            let kg = Snapshot::load(&graph)?.restore()?;
            let strategy = config.miner.strategy(start, end);
            let results = mine::extract_batch(
                &kg,
                &strategy,
                &config.miner,
                config.miner.rng_seed,
                count,
            );

            if let Some(dir) = &output_dir {
                std::fs::create_dir_all(dir).into_diagnostic()?;
            }

            let mut first_error = None;
            let mut mined = 0usize;
            for result in results {
                match result {
                    Ok(sg) => {
                        mined += 1;
                        println!(
                            "# {} -> {} (seed {}, {:?})",
                            sg.start_node(),
                            sg.end_node(),
                            sg.rng_seed(),
                            sg.origin().path_kind
                        );
                        println!("{}\n", sg.to_textual_representation());
                        if let Some(dir) = &output_dir {
                            let path = document_path(dir, sg.origin().method, sg.rng_seed());
                            sg.save_to_file(&path)?;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "subgraph extraction failed");
                        first_error.get_or_insert(e);
                    }
                }
            }

            if mined == 0 {
                if let Some(e) = first_error {
                    return Err(e.into());
                }
            }
            println!("Mined {mined} of {count} subgraphs");
        }

        Commands::Info { graph } => {
            let embedder = default_embedder(&config.engine);
            let engine = Engine::load(&graph, config.engine.clone(), embedder)?;
            println!("{}", engine.info());
            let relations: Vec<&str> = engine.relations().into_iter().collect();
            println!("relations: {}", relations.join(", "));
        }
    }

    Ok(())
}

fn document_path(dir: &Path, method: Method, seed: u64) -> PathBuf {
    dir.join(format!("{method}_{seed}.subgraph.json"))
}
