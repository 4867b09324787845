//! Command-line entry point.
//!
//! Seeds an in-memory store from a JSON file, runs the requested work, and
//! prints the final store snapshot as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use contentflow::config::{AppConfig, ProviderConfig};
use contentflow::core::{ContentId, NewContentItem};
use contentflow::events::LoggingEventSink;
use contentflow::observability::init_tracing;
use contentflow::pipeline::Orchestrator;
use contentflow::store::{ContentStore, InMemoryContentStore};
use contentflow::tasks::{InMemoryTaskQueue, Scheduler, TaskQueue, TaskRunner, Triggers};

#[derive(Parser)]
#[command(name = "contentflow")]
#[command(about = "Generate, check and publish articles")]
struct Cli {
    /// JSON configuration file; the environment is used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use stub providers and dry-run publishers
    #[arg(long, global = true)]
    stub: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline, with retries, for one record
    Run {
        /// JSON array of records to load
        #[arg(long)]
        seed: PathBuf,
        /// Record id
        #[arg(long)]
        id: u64,
    },

    /// Run one sweep over every pending record
    Sweep {
        /// JSON array of records to load
        #[arg(long)]
        seed: PathBuf,
    },

    /// Sweep on a schedule until Ctrl-C
    Serve {
        /// JSON array of records to load
        #[arg(long)]
        seed: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::from_env().context("loading config from environment")?,
    };
    if cli.stub {
        config.providers = ProviderConfig::stubbed();
    }
    Ok(config)
}

async fn seed_store(store: &InMemoryContentStore, path: &Path) -> Result<usize> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let items: Vec<NewContentItem> =
        serde_json::from_str(&raw).context("seed file must be a JSON array of records")?;
    let count = items.len();
    for item in items {
        store.insert(item).await?;
    }
    Ok(count)
}

/// Runs workers until the queue is drained.
async fn drain(runner: &TaskRunner, queue: &InMemoryTaskQueue) {
    queue.close();
    runner.run(CancellationToken::new()).await;
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config.log)?;

    let config = Arc::new(config);
    let store = Arc::new(InMemoryContentStore::new());
    let orchestrator = Orchestrator::from_config(Arc::clone(&config), store.clone())
        .with_event_sink(Arc::new(LoggingEventSink::default()));
    let queue = Arc::new(InMemoryTaskQueue::new());
    let runner = TaskRunner::new(orchestrator, queue.clone());
    let triggers = Triggers::new(queue.clone());

    match &cli.command {
        Commands::Run { seed, id } => {
            let loaded = seed_store(&store, seed).await?;
            info!(loaded, content_id = id, "Store seeded");
            triggers.run_pipeline(ContentId(*id)).await?;
            drain(&runner, &queue).await;
        }
        Commands::Sweep { seed } => {
            let loaded = seed_store(&store, seed).await?;
            info!(loaded, "Store seeded");
            triggers.sweep().await?;
            drain(&runner, &queue).await;
        }
        Commands::Serve { seed } => {
            let loaded = seed_store(&store, seed).await?;
            info!(loaded, "Store seeded");

            let shutdown = CancellationToken::new();
            let scheduler = Scheduler::new(queue.clone() as Arc<dyn TaskQueue>, &config.scheduler);
            let ticker = {
                let shutdown = shutdown.clone();
                tokio::spawn(async move { scheduler.run(shutdown).await })
            };
            let workers = {
                let runner = runner.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { runner.run(shutdown).await })
            };

            tokio::signal::ctrl_c().await?;
            info!("Shutdown requested");
            shutdown.cancel();
            let sweeps = ticker.await?;
            workers.await?;
            info!(sweeps, "Stopped");
        }
    }

    println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
    Ok(())
}
