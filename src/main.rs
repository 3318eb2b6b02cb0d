//! Serial-Harvest main entry point
//!
//! This is the command-line interface for harvesting serialized fiction and
//! comics into local documents.

use anyhow::Context;
use clap::Parser;
use serial_harvest::config::{load_config_with_hash, Config};
use serial_harvest::output::{print_summary, write_summary};
use serial_harvest::storage::{open_repository, InMemoryRepository};
use serial_harvest::Harvester;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Serial-Harvest: incremental acquisition of serialized fiction and comics
///
/// Each URL is matched to a configured site profile. New sources are fetched
/// in full; known sources only fetch chapters published since the last run.
#[derive(Parser, Debug)]
#[command(name = "serial-harvest")]
#[command(version = "1.0.0")]
#[command(about = "Incremental harvester for serialized fiction and comics", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Novel or series URLs to harvest, in order
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show which site handles each URL without fetching
    #[arg(long)]
    dry_run: bool,

    /// Keep harvested state in memory instead of the configured database
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config, &cli.urls)?;
        return Ok(ExitCode::SUCCESS);
    }

    let summary_path = config.output.summary_path.clone();
    let harvester = if cli.in_memory {
        tracing::info!("Using in-memory state; nothing will be persisted");
        Harvester::new(config, InMemoryRepository::new())?
    } else {
        let repository = open_repository(Path::new(&config.output.database_path))
            .with_context(|| format!("Failed to open database {}", config.output.database_path))?;
        Harvester::new(config, repository)?
    };

    let summary = tokio::select! {
        summary = harvester.harvest_all(&cli.urls) => summary,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, cleaning up");
            match harvester.scratch().purge() {
                Ok(path) => tracing::info!("Removed scratch space {}", path.display()),
                Err(e) => tracing::error!("Failed to remove scratch space: {}", e),
            }
            harvester.shutdown().await;
            return Ok(ExitCode::from(130));
        }
    };

    harvester.shutdown().await;

    if !cli.quiet {
        print_summary(&summary);
    }

    if let Some(path) = summary_path {
        write_summary(&summary, Path::new(&path))
            .with_context(|| format!("Failed to write summary {}", path))?;
        tracing::info!("Summary written to {}", path);
    }

    Ok(if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("serial_harvest=info,warn"),
            1 => EnvFilter::new("serial_harvest=debug,info"),
            2 => EnvFilter::new("serial_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --dry-run: shows the configuration and which site handles each URL
fn handle_dry_run(config: &Config, urls: &[String]) -> anyhow::Result<()> {
    println!("=== Serial-Harvest Dry Run ===\n");

    println!("Harvester Configuration:");
    println!("  Concurrency: {}", config.harvester.concurrency);
    println!("  Loader attempts: {}", config.harvester.loader_max_attempts);
    println!("  Chapter attempts: {}", config.harvester.chapter_max_attempts);
    println!("  Retry base delay: {}ms", config.harvester.retry_base_delay_ms);
    println!(
        "  Resume from last TOC page: {}",
        config.harvester.resume_from_last_toc_page
    );
    println!("  Browser pool capacity: {}", config.browser.pool_capacity);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Documents: {}", config.output.output_dir);
    if let Some(summary) = &config.output.summary_path {
        println!("  Summary: {}", summary);
    }

    // Nothing is fetched: the browser is only launched on first use
    let harvester = Harvester::new(config.clone(), InMemoryRepository::new())?;
    println!("\nSites ({}):", harvester.registry().len());
    for authority in harvester.registry().authorities() {
        let site = harvester.registry().dispatch(&authority)?.profile;
        let mut flags = Vec::new();
        if site.requires_browser {
            flags.push("browser");
        }
        if site.has_images_for_content {
            flags.push("images");
        }
        if site.toc_newest_first {
            flags.push("newest-first");
        }
        println!("  - {} [{}]", authority, flags.join(", "));
    }

    println!("\nPlan:");
    for (url, dispatch) in harvester.plan(urls) {
        match dispatch {
            Ok(dispatch) => println!("  {} -> {}", url, dispatch.authority),
            Err(e) => println!("  {} -> ERROR: {}", url, e),
        }
    }

    println!("\nConfiguration is valid.");
    Ok(())
}
