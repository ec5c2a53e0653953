use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetsync::config::Config;
use fleetsync::sync::SyncRepository;

#[derive(Parser)]
#[command(
    name = "fleetsync",
    version,
    about = "Reconcile resource unavailabilities from a master scheduling API into a target",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize every active resource
    Sync {
        /// First day of the window (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last day of the window (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Compute the diff without changing the target
        #[arg(long, default_value = "false")]
        dry_run: bool,

        /// Resources reconciled concurrently
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Show the diff for one resource over the current year
    Compare {
        /// Resource id
        resource_id: String,
    },

    /// List active resources in the master environment
    Resources,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }

    setup_tracing(&config.logging.level, &config.logging.format, cli.verbose)?;

    tracing::info!("fleetsync starting");

    match cli.command {
        Commands::Sync {
            start,
            end,
            dry_run,
            concurrency,
        } => {
            if let Some(start) = start {
                config.sync.start_date = start;
            }
            if let Some(end) = end {
                config.sync.end_date = end;
            }
            if let Some(concurrency) = concurrency {
                config.sync.max_concurrent_resources = concurrency;
            }
            config.sync.dry_run |= dry_run;
            config.validate()?;

            tracing::info!(
                master = %config.master.base_url,
                target = %config.target.base_url,
                "Starting sync command"
            );
            sync(&config).await?;
        }

        Commands::Compare { resource_id } => {
            config.validate()?;
            tracing::info!(resource_id = %resource_id, "Starting compare command");
            compare(&config, &resource_id).await?;
        }

        Commands::Resources => {
            config.validate()?;
            resources(&config).await?;
        }
    }

    Ok(())
}

fn setup_tracing(level: &str, format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("fleetsync=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("fleetsync={level},warn"))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    Ok(())
}

async fn sync(config: &Config) -> Result<()> {
    let orchestrator = fleetsync::build_orchestrator(config)?;
    let result = orchestrator.run(&config.settings()).await;

    println!("Synchronization {}", if result.success { "succeeded" } else { "failed" });
    println!("  Resources processed: {}", result.resources_processed);
    println!("  Created: {}", result.created);
    println!("  Updated: {}", result.updated);
    println!("  Deleted: {}", result.deleted);
    println!("  Duration: {:.2?}", result.duration);
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
    for error in &result.errors {
        println!("  error: {error}");
    }

    if !result.success {
        anyhow::bail!("synchronization finished with {} error(s)", result.errors.len());
    }
    Ok(())
}

async fn compare(config: &Config, resource_id: &str) -> Result<()> {
    let reconciler = fleetsync::build_reconciler(config)?;
    let operation = reconciler.compare(resource_id).await?;
    println!("{}", serde_json::to_string_pretty(&operation)?);
    Ok(())
}

async fn resources(config: &Config) -> Result<()> {
    let orchestrator = fleetsync::build_orchestrator(config)?;
    for resource in orchestrator.active_resources().await? {
        println!(
            "{}\t{}\t{}\t{}",
            resource.id,
            resource.external_id.as_deref().unwrap_or("-"),
            resource.resource_type,
            resource.name
        );
    }
    Ok(())
}
