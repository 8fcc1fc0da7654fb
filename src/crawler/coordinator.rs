//! Harvest coordinator - main run orchestration logic
//!
//! This module contains the run loop that coordinates all aspects of a
//! harvest, including:
//! - Recording the run and its final totals in storage
//! - Discovering (or reloading) the category catalog
//! - Applying the configured category selection
//! - Crawling each selected category in turn

use crate::config::Config;
use crate::crawler::counters::CrawlCounters;
use crate::crawler::discovery::discover_and_persist_categories;
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::model::Category;
use crate::crawler::pages::{CategoryReport, CrawlSettings, PageCrawler};
use crate::storage::{RunTotals, SqliteStorage, Storage};
use crate::HarvestError;
use std::path::Path;
use std::sync::Arc;

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: i64,
    pub categories: Vec<CategoryReport>,
    pub totals: RunTotals,
    pub rows_rejected: u64,
}

/// Main harvest coordinator structure
pub struct Coordinator<F, S> {
    config: Arc<Config>,
    fetcher: Arc<F>,
    storage: S,
    counters: Arc<CrawlCounters>,
    config_hash: String,
}

impl Coordinator<HttpFetcher, SqliteStorage> {
    /// Creates a coordinator talking to the configured site and database
    ///
    /// # Arguments
    ///
    /// * `config` - The harvester configuration
    /// * `config_hash` - Hash of the configuration file, stored on the run row
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Failed to open the database or build the client
    pub fn new(config: Config, config_hash: impl Into<String>) -> Result<Self, HarvestError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        let fetcher = HttpFetcher::new(&config.site)?;
        Ok(Self::with_parts(config, config_hash, fetcher, storage))
    }
}

impl<F, S> Coordinator<F, S>
where
    F: Fetcher + 'static,
    S: Storage,
{
    /// Creates a coordinator from explicit collaborators
    pub fn with_parts(config: Config, config_hash: impl Into<String>, fetcher: F, storage: S) -> Self {
        Self {
            config: Arc::new(config),
            fetcher: Arc::new(fetcher),
            storage,
            counters: Arc::new(CrawlCounters::new()),
            config_hash: config_hash.into(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn counters(&self) -> &CrawlCounters {
        &self.counters
    }

    /// Runs a complete harvest
    ///
    /// Discovery failures abort the run (marked failed in storage). Page and
    /// article failures never do; they only show up in the counters.
    pub async fn run(&mut self) -> Result<RunSummary, HarvestError> {
        let run_id = self.storage.create_run(&self.config_hash)?;
        tracing::info!("Starting harvest run {}", run_id);
        let start_time = std::time::Instant::now();

        let catalog = match discover_and_persist_categories(
            &*self.fetcher,
            &mut self.storage,
            &self.config.site,
            &self.config.output.catalog_collection,
        )
        .await
        {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::error!("Category discovery failed: {}", e);
                if let Err(store_err) = self.storage.fail_run(run_id, &self.counters.totals()) {
                    tracing::error!("Could not mark run {} as failed: {}", run_id, store_err);
                }
                return Err(e);
            }
        };

        let selected = select_categories(catalog, &self.config.crawler.categories);
        tracing::info!("{} categories selected for crawling", selected.len());

        let crawler = PageCrawler::new(
            Arc::clone(&self.fetcher),
            Arc::new(CrawlSettings::from_config(&self.config)),
            Arc::clone(&self.counters),
        );

        let mut reports = Vec::with_capacity(selected.len());
        for category in &selected {
            tracing::info!("Crawling category {} ({} pages)", category.name, category.page_count);

            let report = crawler.crawl_category(category, &mut self.storage).await;
            tracing::info!(
                "Finished {}: {} records, {} failed pages, {} failed articles, {} rejected rows",
                report.category,
                report.records_written,
                report.pages_failed,
                report.articles_failed,
                report.rows_rejected
            );
            reports.push(report);
        }

        let totals = self.counters.totals();
        self.storage.complete_run(run_id, &totals)?;

        tracing::info!(
            "Harvest completed in {:?}: {} records, {} page errors, {} article errors",
            start_time.elapsed(),
            totals.records_written,
            totals.page_errors,
            totals.article_errors
        );

        Ok(RunSummary {
            run_id,
            categories: reports,
            totals,
            rows_rejected: self.counters.rows_rejected(),
        })
    }
}

/// Keeps the categories named in `selection`, or all of them when it is empty
///
/// Catalog order is preserved. Names missing from the catalog are reported
/// and ignored.
pub fn select_categories(catalog: Vec<Category>, selection: &[String]) -> Vec<Category> {
    if selection.is_empty() {
        return catalog;
    }

    for name in selection {
        if !catalog.iter().any(|c| &c.name == name) {
            tracing::warn!("Selected category '{}' is not in the catalog", name);
        }
    }

    catalog
        .into_iter()
        .filter(|c| selection.contains(&c.name))
        .collect()
}

/// Runs the main harvest operation
///
/// This function orchestrates the entire process:
///
/// 1. Open the database and record a new run
/// 2. Discover or reload the category catalog
/// 3. Crawl each selected category, pages in parallel, categories in sequence
/// 4. Record the run's final totals
///
/// # Example
///
/// ```no_run
/// use consult_harvest::config::load_config_with_hash;
/// use consult_harvest::crawler::run_harvest;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let summary = run_harvest(config, hash).await?;
/// println!("{} records", summary.totals.records_written);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(config: Config, config_hash: String) -> Result<RunSummary, HarvestError> {
    let mut coordinator = Coordinator::new(config, config_hash)?;
    coordinator.run().await
}
