//! imagepipe command-line runner
//!
//! Runs a batch of image names through the simulated two-stage pipeline.

mod metrics;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imagepipe_core::{
    load_config, validate_config, Config, Pipeline, SimulatedStage, WorkItem, DEMO_IMAGES,
};

#[derive(Debug, Parser)]
#[command(name = "imagepipe")]
#[command(about = "Resize, watermark and save images through two worker pools", long_about = None)]
struct Cli {
    /// Path to configuration file (defaults are used when it does not exist)
    #[arg(short, long, default_value = "imagepipe.toml", global = true)]
    config: PathBuf,

    /// Override the number of processor workers
    #[arg(long, global = true)]
    processors: Option<usize>,

    /// Override the number of saver workers
    #[arg(long, global = true)]
    savers: Option<usize>,

    /// Seed for reproducible simulated failures
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Print the run summary as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Print Prometheus metrics after the run
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the pipeline (default if no command specified)
    Run {
        /// Image names to process (defaults to the six demo images)
        items: Vec<String>,
    },

    /// Validate configuration
    Validate,

    /// Print the default configuration as TOML
    GenerateConfig {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        None => run_command(&cli, &[]).await,
        Some(Commands::Run { items }) => run_command(&cli, items).await,
        Some(Commands::Validate) => validate_command(&cli),
        Some(Commands::GenerateConfig { output }) => generate_config_command(output.as_deref()),
    }
}

async fn run_command(cli: &Cli, names: &[String]) -> Result<()> {
    let config = resolve_config(cli)?;

    let items = work_items(names);
    info!(
        "Processing {} images with {} processors and {} savers",
        items.len(),
        config.pipeline.processor_workers,
        config.pipeline.saver_workers
    );

    let stage = SimulatedStage::new(config.simulation.clone());
    let pipeline = Pipeline::new(config.pipeline, stage);
    let summary = pipeline.run(items).await.context("Pipeline run failed")?;

    info!("Total: {}, Failed: {}", summary.total, summary.failed);

    if cli.json {
        let json = serde_json::to_string_pretty(&summary)
            .context("Failed to serialize run summary")?;
        println!("{}", json);
    }

    if cli.metrics {
        print!("{}", metrics::encode_metrics());
    }

    Ok(())
}

fn validate_command(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    info!(
        processors = config.pipeline.processor_workers,
        savers = config.pipeline.saver_workers,
        total_capacity = config.pipeline.total_capacity(),
        "Configuration is valid"
    );
    Ok(())
}

fn generate_config_command(output: Option<&Path>) -> Result<()> {
    let toml = toml::to_string_pretty(&Config::default())
        .context("Failed to serialize default configuration")?;

    match output {
        Some(path) => {
            std::fs::write(path, &toml)
                .with_context(|| format!("Failed to write config to {:?}", path))?;
            info!("Wrote default configuration to {:?}", path);
        }
        None => print!("{}", toml),
    }

    Ok(())
}

/// Loads the config file (or defaults), applies CLI overrides and validates.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = if cli.config.exists() {
        info!("Loading configuration from {:?}", cli.config);
        load_config(&cli.config)
            .with_context(|| format!("Failed to load config from {:?}", cli.config))?
    } else {
        info!("No configuration file at {:?}, using defaults", cli.config);
        Config::default()
    };

    apply_overrides(&mut config, cli);
    validate_config(&config).context("Configuration validation failed")?;

    Ok(config)
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(processors) = cli.processors {
        config.pipeline.processor_workers = processors;
    }
    if let Some(savers) = cli.savers {
        config.pipeline.saver_workers = savers;
    }
    if let Some(seed) = cli.seed {
        config.simulation.seed = Some(seed);
    }
}

fn work_items(names: &[String]) -> Vec<WorkItem> {
    if names.is_empty() {
        DEMO_IMAGES.iter().map(|name| WorkItem::new(*name)).collect()
    } else {
        names.iter().map(|name| WorkItem::new(name.as_str())).collect()
    }
}
