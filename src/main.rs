//! Shelf-Harvest main entry point
//!
//! This is the command-line interface for the Shelf-Harvest product harvester.

use anyhow::Context;
use clap::Parser;
use shelf_harvest::config::{load_config_with_hash, AdapterConfig, Config};
use shelf_harvest::storage::{open_storage, RecordFilter, Storage};
use shelf_harvest::{HarvestRequest, Orchestrator, StopHandle};
use std::path::PathBuf;

/// Shelf-Harvest: a job-tracked product harvester
///
/// Shelf-Harvest runs every configured query against its storefront using a
/// static, browser or managed-crawl adapter, and stores normalized products
/// in a SQLite database deduplicated by product link.
#[derive(Parser, Debug)]
#[command(name = "shelf-harvest")]
#[command(version)]
#[command(about = "A job-tracked product harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Also write logs to this file (overrides `log-file` in the config)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Validate config and show what would be harvested without fetching
    #[arg(long, conflicts_with = "records")]
    dry_run: bool,

    /// List stored records and exit
    #[arg(long, conflicts_with = "dry_run")]
    records: bool,

    /// Restrict --records to one search term
    #[arg(long, requires = "records", value_name = "QUERY")]
    query: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    let log_file = cli.log_file.clone().or_else(|| config.harvest.log_file.clone());
    let _log_guard = shelf_harvest::logging::init(cli.verbose, cli.quiet, log_file.as_deref())
        .context("failed to initialize logging")?;

    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.records {
        handle_records(&config, cli.query.as_deref())?;
    } else {
        handle_harvest(config).await?;
    }

    Ok(())
}

/// Handles the --dry-run mode: shows the jobs a run would create
fn handle_dry_run(config: &Config) {
    println!("=== Shelf-Harvest Dry Run ===\n");

    println!("Settings:");
    println!("  Database: {}", config.harvest.database_path);
    println!("  Max workers: {}", config.harvest.max_workers);
    if let Some(log_file) = &config.harvest.log_file {
        println!("  Log file: {}", log_file.display());
    }

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        let adapter = &source.adapter;
        let pages = adapter.pages();
        println!("  - {} [{}]", source.name, adapter.kind());
        println!("    Template: {}", adapter.url_template());
        println!(
            "    Pages: {}..{}",
            pages.start_page,
            pages.start_page.saturating_add(pages.max_pages)
        );
        println!(
            "    Delay: {}-{}ms",
            adapter.delay().min_ms,
            adapter.delay().max_ms
        );
        match adapter {
            AdapterConfig::Static(c) => println!("    Page workers: {}", c.workers),
            AdapterConfig::Browser(c) => println!("    Wait for: {}", c.wait_selector),
            AdapterConfig::ManagedCrawl(c) => println!(
                "    Retries: {} on {:?}",
                c.max_retries, c.retry_statuses
            ),
        }
        for query in &source.queries {
            println!("    * {}", query);
        }
    }

    let jobs = HarvestRequest::from_config(config).len();
    println!("\n✓ Configuration is valid");
    println!("✓ Would queue {} jobs", jobs);
}

/// Handles the --records mode: prints stored products
fn handle_records(config: &Config, query: Option<&str>) -> anyhow::Result<()> {
    let storage = open_storage(config.harvest.database_path.as_ref())
        .with_context(|| format!("failed to open {}", config.harvest.database_path))?;

    let filter = query.map(RecordFilter::search_term);
    let records = storage.query_records(filter.as_ref())?;

    for record in &records {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            record.search_term,
            record.name,
            record.price_raw.as_deref().unwrap_or("-"),
            record.availability_status,
            record.link.as_deref().unwrap_or("-")
        );
    }

    println!("\n{} records", records.len());
    if query.is_none() {
        for (term, count) in storage.record_counts_by_query()? {
            println!("  {}: {}", term, count);
        }
    }

    Ok(())
}

/// Handles the main harvest run
async fn handle_harvest(config: Config) -> anyhow::Result<()> {
    let storage = open_storage(config.harvest.database_path.as_ref())
        .with_context(|| format!("failed to open {}", config.harvest.database_path))?;

    let requests = HarvestRequest::from_config(&config);
    tracing::info!(
        "Harvesting {} queries across {} sources",
        requests.len(),
        config.sources.len()
    );

    let stop = StopHandle::new();
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing running jobs");
            ctrl_c_stop.stop();
        }
    });

    let mut orchestrator = Orchestrator::new(storage, config.harvest.max_workers).with_stop(stop);
    let summary = orchestrator.run(requests).await?;

    println!("{}", summary);
    Ok(())
}
