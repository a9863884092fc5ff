//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the Catalog-Harvest book harvester.

use anyhow::Context;
use catalog_harvest::config::{load_config_with_hash, Config};
use catalog_harvest::crawler::{run_harvest, HarvestMode, HarvestOptions, HarvestSummary};
use catalog_harvest::output::{
    load_ledger_summary, print_ledger_summary, print_statistics, read_url_column,
    COMBINED_URLS_FILE, URL_COLUMN,
};
use catalog_harvest::storage::{open_ledger, Ledger, RunStatus};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a quota-driven catalog harvester
///
/// Catalog-Harvest discovers book URLs for each configured category until a
/// quota is met, then extracts title, author, rating, description and genres
/// from every page with a pool of isolated sessions, checkpointing each batch.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A quota-driven catalog harvester", long_about = None)]
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

    /// Resume an unfinished harvest (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh harvest, ignoring an unfinished one
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "discover_only", "extract_only"])]
    dry_run: bool,

    /// Show the run ledger and exit
    #[arg(long, conflicts_with_all = ["dry_run", "discover_only", "extract_only"])]
    stats: bool,

    /// Stop after writing the discovered URL lists
    #[arg(long, conflicts_with = "extract_only")]
    discover_only: bool,

    /// Skip discovery and extract from an existing URL list
    #[arg(long)]
    extract_only: bool,

    /// URL list for --extract-only (CSV with a book_url column)
    #[arg(long, value_name = "FILE", requires = "extract_only")]
    input: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        let mode = if cli.discover_only {
            HarvestMode::DiscoverOnly
        } else if cli.extract_only {
            HarvestMode::ExtractOnly
        } else {
            HarvestMode::Full
        };
        let options = HarvestOptions {
            mode,
            fresh: cli.fresh,
            input: cli.input,
        };
        handle_harvest(config, &config_hash, options).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Catalog-Harvest Dry Run ===\n");

    println!("Harvest Configuration:");
    println!("  Default quota: {}", config.harvest.quota);
    println!("  Batch size: {}", config.harvest.batch_size);
    println!("  Workers per batch: {}", config.harvest.worker_count);
    match config.harvest.max_batches {
        Some(max) => println!("  Max batches: {}", max),
        None => println!("  Max batches: unlimited"),
    }
    println!("  Item marker: {}", config.harvest.item_marker);

    println!("\nDiscovery:");
    println!("  Listing pages: {}", config.discovery.max_pages);
    println!(
        "  Sort modes: {} x {} pages",
        config.discovery.sort_modes.len(),
        config.discovery.sort_pages
    );
    println!(
        "  Search terms: {} x {} pages",
        config.discovery.search_terms.len(),
        config.discovery.search_pages
    );

    println!("\nPoliteness:");
    let delays = [
        ("Item delay", config.politeness.item_delay),
        ("Page delay", config.politeness.page_delay),
        ("Category delay", config.politeness.category_delay),
    ];
    for (label, range) in delays {
        println!("  {}: {}-{}ms", label, range.min_ms, range.max_ms);
    }

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);
    println!("  Database: {}", config.output.database_path);

    println!("\nCategories ({}):", config.categories.len());
    let mut planned_urls = 0;
    for entry in &config.categories {
        let quota = entry.quota.unwrap_or(config.harvest.quota);
        planned_urls += quota;
        match &entry.name {
            Some(name) => println!("  - {} ({} URLs): {}", name, quota, entry.url),
            None => println!("  - {} ({} URLs)", entry.url, quota),
        }
    }

    let combined = Path::new(&config.output.directory).join(COMBINED_URLS_FILE);
    let (url_count, source) = match read_url_column(&combined, URL_COLUMN) {
        Ok(urls) => (urls.len(), format!("{} URLs in {}", urls.len(), combined.display())),
        Err(_) => (planned_urls, format!("up to {} URLs from discovery", planned_urls)),
    };
    let mut batches = url_count.div_ceil(config.harvest.batch_size);
    if let Some(max) = config.harvest.max_batches {
        batches = batches.min(max);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would extract {} in {} batches", source, batches);

    Ok(())
}

/// Handles the --stats mode: shows the run ledger
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    // Open the database
    let ledger = open_ledger(Path::new(&config.output.database_path))?;

    // Load and print the summary
    let summary = load_ledger_summary(&ledger)?;
    print_ledger_summary(&summary);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: &str,
    options: HarvestOptions,
) -> anyhow::Result<()> {
    if options.fresh {
        tracing::info!("Starting fresh harvest (ignoring previous state)");
    } else {
        tracing::info!("Starting harvest (will resume an unfinished run)");
    }

    tracing::info!(
        "Categories: {}, batch size: {}, workers: {}",
        config.categories.len(),
        config.harvest.batch_size,
        config.harvest.worker_count
    );

    let database_path = PathBuf::from(&config.output.database_path);

    tokio::select! {
        result = run_harvest(config, config_hash, options) => {
            match result {
                Ok(summary) => {
                    tracing::info!("Harvest completed successfully");
                    report_summary(&summary);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("Harvest failed: {}", e);
                    Err(e.into())
                }
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            tracing::warn!("Interrupted, marking the run as resumable");
            mark_interrupted(&database_path)?;
            Ok(())
        }
    }
}

/// Marks the running harvest as interrupted so the next start resumes it
fn mark_interrupted(database_path: &Path) -> anyhow::Result<()> {
    let mut ledger = open_ledger(database_path)?;
    if let Some(run) = ledger.get_latest_run()? {
        if run.status == RunStatus::Running {
            ledger.update_run_status(run.id, RunStatus::Interrupted)?;
            println!("Run {} interrupted; start again without --fresh to resume", run.id);
        }
    }
    Ok(())
}

fn report_summary(summary: &HarvestSummary) {
    println!();
    if summary.resumed {
        println!("Resumed run {}", summary.run_id);
    } else {
        println!("Run {}", summary.run_id);
    }

    for report in &summary.discovery {
        let status = if report.quota_met() {
            "quota met".to_string()
        } else {
            format!("short by {}", report.shortfall())
        };
        println!(
            "  {:24} {:>5}/{:<5} {} ({} pages, {} failed)",
            report.category,
            report.discovered,
            report.quota,
            status,
            report.pages_visited,
            report.pages_failed
        );
    }
    println!("URLs: {}", summary.url_count);

    if let Some(extraction) = &summary.extraction {
        println!(
            "Batches: {} run, {} resumed",
            extraction.batches_run, extraction.batches_skipped
        );
        println!(
            "Items: {} records, {} failures, {} incomplete",
            extraction.records, extraction.failures, extraction.incomplete
        );
        if extraction.fatal_workers > 0 {
            println!("Workers stopped early: {}", extraction.fatal_workers);
        }
    }

    if let Some(export) = &summary.export {
        println!();
        print_statistics(&export.statistics);
        println!();
        println!("✓ Dataset written to {}", export.csv.display());
        println!("✓ Spreadsheet written to {}", export.xlsx.display());
    }
}
