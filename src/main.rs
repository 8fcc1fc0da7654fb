//! Consult-Harvest main entry point
//!
//! This is the command-line interface for the Consult-Harvest Q&A catalog harvester.

use anyhow::Context;
use clap::Parser;
use consult_harvest::config::{load_config_with_hash, Config};
use consult_harvest::crawler::{run_harvest, Category, CrawlSettings};
use consult_harvest::output::{load_statistics, print_statistics};
use consult_harvest::storage::{open_storage, Storage};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Consult-Harvest: a paced harvester for paginated Q&A catalogs
///
/// Consult-Harvest discovers every category of a consultation site, walks
/// each category's paginated listing with a bounded pool of workers and
/// stores every question, answer and listing attribute as one document
/// per article.
#[derive(Parser, Debug)]
#[command(name = "consult-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A paced harvester for paginated Q&A catalogs", long_about = None)]
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

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Only harvest the named category (repeatable); overrides the config list
    #[arg(long = "category", value_name = "NAME")]
    categories: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The log file location lives in the config, so it is loaded first
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let _log_guard = setup_logging(cli.verbose, cli.quiet, config.output.log_path.as_deref())?;
    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    if !cli.categories.is_empty() {
        config.crawler.categories = cli.categories;
    }

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_harvest(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Events always go to stdout. When `log_path` is set they are also appended
/// to that file through a background writer; the returned guard flushes it
/// on drop and must live until exit.
fn setup_logging(
    verbose: u8,
    quiet: bool,
    log_path: Option<&str>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("consult_harvest=info,warn"),
            1 => EnvFilter::new("consult_harvest=debug,info"),
            2 => EnvFilter::new("consult_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let (file_layer, guard) = match log_path {
        Some(path) => {
            let path = Path::new(path);
            let directory = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let file_name = path
                .file_name()
                .with_context(|| format!("Log path {} has no file name", path.display()))?;
            std::fs::create_dir_all(directory)?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Consult-Harvest Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!(
        "  Encoding: {}{}",
        config.site.encoding,
        if config.site.strict_decoding { " (strict)" } else { "" }
    );
    println!("  Request timeout: {}s", config.site.request_timeout_secs);
    println!("  Index: {}", config.site.index_path);
    println!(
        "  Listing page 2 of <name>: {}{}",
        config.site.listing_path("<name>"),
        config.site.page_suffix_for(2)
    );

    let settings = CrawlSettings::from_config(config);
    println!("\nCrawler Configuration:");
    println!("  Max concurrent pages: {}", settings.max_concurrent_pages);
    println!(
        "  Pause before each article: {:?} to {:?}",
        settings.jitter_min, settings.jitter_max
    );
    println!(
        "  Article retry: {} attempts, {:?} + {:?} per attempt",
        settings.article_retry.max_attempts,
        settings.article_retry.base_delay,
        settings.article_retry.step
    );
    println!(
        "  Page retry: {} attempts, {:?} + {:?} per attempt",
        settings.page_retry.max_attempts, settings.page_retry.base_delay, settings.page_retry.step
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Catalog collection: {}", config.output.catalog_collection);
    if let Some(log_path) = &config.output.log_path {
        println!("  Log file: {}", log_path);
    }

    let database = Path::new(&config.output.database_path);
    let catalog = if database.exists() {
        let storage = open_storage(database)?;
        storage
            .find_all(&config.output.catalog_collection)?
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Category>, _>>()?
    } else {
        Vec::new()
    };

    if catalog.is_empty() {
        println!("\nCatalog: not discovered yet (will be built from the index page)");
    } else {
        let selected =
            consult_harvest::crawler::select_categories(catalog, &config.crawler.categories);
        println!("\nCategories to harvest ({}):", selected.len());
        for category in &selected {
            println!("  - {} ({} pages)", category.name, category.page_count);
        }
        println!(
            "\n✓ Would crawl {} listing pages",
            selected.iter().map(|c| c.page_count as u64).sum::<u64>()
        );
    }

    if !config.crawler.categories.is_empty() {
        println!("\nCategory filter: {}", config.crawler.categories.join(", "));
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage, &config.output.catalog_collection)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: String) -> anyhow::Result<()> {
    if config.crawler.categories.is_empty() {
        tracing::info!("Harvesting every category");
    } else {
        tracing::info!(
            "Harvesting selected categories: {}",
            config.crawler.categories.join(", ")
        );
    }

    match run_harvest(config, config_hash).await {
        Ok(summary) => {
            println!("\n=== Harvest Run #{} ===\n", summary.run_id);
            for report in &summary.categories {
                println!(
                    "  {}: {} records from {} pages ({} pages failed, {} articles failed)",
                    report.category,
                    report.records_written,
                    report.pages,
                    report.pages_failed,
                    report.articles_failed
                );
            }
            println!();
            println!("Records written: {}", summary.totals.records_written);
            println!("Page errors: {}", summary.totals.page_errors);
            println!("Article errors: {}", summary.totals.article_errors);
            println!("Rows rejected: {}", summary.rows_rejected);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
