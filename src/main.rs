//! Certsweep main entry point
//!
//! This is the command-line interface for the certsweep record harvester.

use certsweep::config::{load_config, validate, Config};
use certsweep::harvester::Coordinator;
use certsweep::model::RangeDescriptor;
use certsweep::ranges::{patterns_for_mode, year_pattern, HarvestMode};
use chrono::Datelike;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Certsweep: a resumable certificate-record harvester
///
/// Certsweep enumerates the sparse ID space of a public certificate
/// verification endpoint, fetching each live record exactly once and
/// persisting results durably across interruptions and restarts.
#[derive(Parser, Debug)]
#[command(name = "certsweep")]
#[command(version = "1.0.0")]
#[command(about = "A resumable certificate-record harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Which ID patterns to cover: auto, legacy, new, future, or discover
    #[arg(short, long, default_value = "auto")]
    mode: String,

    /// Harvest only the derived block for this graduation year
    #[arg(long, conflicts_with_all = ["start", "end"])]
    year: Option<i32>,

    /// First candidate ID of an explicit range (requires --end)
    #[arg(long, requires = "end")]
    start: Option<u64>,

    /// Last candidate ID of an explicit range (requires --start)
    #[arg(long, requires = "start")]
    end: Option<u64>,

    /// Maximum concurrent resolutions in flight
    #[arg(long, value_name = "N")]
    concurrent: Option<usize>,

    /// Maximum retry attempts per ID beyond the first
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    /// Path of the output CSV table
    #[arg(short, long, value_name = "PATH")]
    output: Option<String>,

    /// Re-probe IDs that already have a recorded outcome
    #[arg(long)]
    rescrape: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config(path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => Config::default(),
    };

    // CLI flags override file values
    if let Some(concurrent) = cli.concurrent {
        config.harvester.concurrency = concurrent;
    }
    if let Some(max_retries) = cli.max_retries {
        config.harvester.max_retries = max_retries;
    }
    if let Some(output) = &cli.output {
        config.output.table_path = output.clone();
    }
    validate(&config)?;

    let current_year = chrono::Utc::now().year();

    if cli.mode == "discover" {
        return handle_discover(config, current_year).await;
    }

    let Some(mode) = HarvestMode::from_str_opt(&cli.mode) else {
        tracing::error!(
            "Unknown mode '{}'; expected auto, legacy, new, future, or discover",
            cli.mode
        );
        std::process::exit(2);
    };

    // Resolve the ranges to cover, narrowest request wins
    let ranges = if let (Some(start), Some(end)) = (cli.start, cli.end) {
        if start > end {
            return Err(certsweep::SweepError::InvalidRange { start, end }.into());
        }
        vec![RangeDescriptor::new("explicit", start, end)]
    } else if let Some(year) = cli.year {
        vec![year_pattern(year)]
    } else {
        patterns_for_mode(mode, &config, current_year)
    };

    handle_harvest(config, &ranges, cli.rescrape).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("certsweep=info,warn"),
            1 => EnvFilter::new("certsweep=debug,info"),
            2 => EnvFilter::new("certsweep=trace,debug"),
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

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    ranges: &[RangeDescriptor],
    rescrape: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if rescrape {
        tracing::info!("Re-scrape requested; previously resolved IDs will be probed again");
    }

    let mut coordinator = Coordinator::new(config)?;
    let summary = coordinator.run(ranges, rescrape).await?;

    let store = coordinator.store();
    let retried = store
        .records()
        .values()
        .filter(|r| r.retry_count > 0)
        .count();

    println!("\n=== Harvest Summary ===");
    println!("Resolved this run:  {}", summary.stats.completed);
    println!("  Found:            {}", summary.stats.found);
    println!("  Absent:           {}", summary.stats.absent);
    println!("  Failed:           {}", summary.stats.failed);
    println!("Records in table:   {}", summary.records_total);
    println!("  Needed retries:   {}", retried);
    println!("Total resolved IDs: {}", summary.resolved_total);
    println!("Table:              {}", store.table_path().display());
    println!("Backup:             {}", store.backup_path().display());
    println!("Checkpoint:         {}", store.checkpoint_path().display());
    if summary.cancelled {
        println!("\nRun was interrupted; rerun the same command to resume.");
    }

    Ok(())
}

/// Handles the discover mode: probes for live ID blocks outside the catalog
async fn handle_discover(
    config: Config,
    current_year: i32,
) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = Coordinator::new(config)?;
    let blocks = coordinator.discover(current_year).await?;

    println!("\n=== Discovery Report ===");
    if blocks.is_empty() {
        println!("No live ID blocks found outside the known catalog.");
        return Ok(());
    }

    let total_probes: usize = blocks.iter().map(|b| b.probes).sum();
    for block in &blocks {
        println!(
            "  {} ({} probes)  ->  --start {} --end {}",
            block.range, block.probes, block.range.start, block.range.end
        );
    }
    println!("\n{} live blocks located in {} probes total.", blocks.len(), total_probes);
    println!("Harvest a block with the --start/--end flags shown above.");

    Ok(())
}
