//! Per-category page crawling
//!
//! Every listing page of a category becomes one task on a `JoinSet`; a
//! semaphore caps how many of them run at once. Inside a task the detail
//! pages are fetched one after another with a random pause before each, so
//! the pool bounds the request rate as well as the parallelism. Batches are
//! written to the category's collection in completion order, as soon as
//! each page finishes.

use crate::config::{Config, SiteConfig};
use crate::crawler::counters::CrawlCounters;
use crate::crawler::extractor::{extract_detail, extract_listing};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::model::{Category, Record};
use crate::crawler::retry::{retry, RetryPolicy};
use crate::storage::Storage;
use crate::HarvestError;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Tunables of a category crawl
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Page suffix template and detail link prefix
    pub site: SiteConfig,

    /// Pages crawled at once
    pub max_concurrent_pages: usize,

    /// Bounds of the pause before each detail fetch
    pub jitter_min: Duration,
    pub jitter_max: Duration,

    pub page_retry: RetryPolicy,
    pub article_retry: RetryPolicy,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        let (jitter_min, jitter_max) = config.crawler.jitter_range();
        Self {
            site: config.site.clone(),
            max_concurrent_pages: config.crawler.max_concurrent_pages as usize,
            jitter_min,
            jitter_max,
            page_retry: RetryPolicy::from(&config.retry.page),
            article_retry: RetryPolicy::from(&config.retry.article),
        }
    }

    /// Relative path of one listing page of `category`
    pub fn page_path(&self, category: &Category, page: u32) -> String {
        category.page_path(&self.site.page_suffix_for(page))
    }

    fn jitter(&self) -> Duration {
        if self.jitter_max <= self.jitter_min {
            return self.jitter_min;
        }
        let millis = rand::thread_rng()
            .gen_range(self.jitter_min.as_millis() as u64..=self.jitter_max.as_millis() as u64);
        Duration::from_millis(millis)
    }
}

/// Outcome of crawling one category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryReport {
    pub category: String,
    pub pages: u32,
    pub pages_failed: u64,
    pub articles_failed: u64,
    pub rows_rejected: u64,
    pub records_written: u64,
}

/// Records of one page plus the failures met while building them
#[derive(Debug, Default)]
struct PageOutcome {
    records: Vec<Record>,
    articles_failed: u64,
    rows_rejected: u64,
}

/// Crawls every page of a category on a bounded pool
pub struct PageCrawler<F> {
    fetcher: Arc<F>,
    settings: Arc<CrawlSettings>,
    counters: Arc<CrawlCounters>,
}

impl<F> PageCrawler<F>
where
    F: Fetcher + 'static,
{
    pub fn new(fetcher: Arc<F>, settings: Arc<CrawlSettings>, counters: Arc<CrawlCounters>) -> Self {
        Self {
            fetcher,
            settings,
            counters,
        }
    }

    /// Crawls all pages of `category` and appends their records to its collection
    ///
    /// Never fails as a whole: a page whose listing cannot be fetched after
    /// all retries, whose task panics, or whose batch cannot be written is
    /// counted as a page error and the remaining pages carry on.
    pub async fn crawl_category<S>(&self, category: &Category, storage: &mut S) -> CategoryReport
    where
        S: Storage + ?Sized,
    {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_pages.max(1)));
        let shared_category = Arc::new(category.clone());
        let mut tasks = JoinSet::new();

        for page in 1..=category.page_count {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&self.fetcher);
            let settings = Arc::clone(&self.settings);
            let counters = Arc::clone(&self.counters);
            let category = Arc::clone(&shared_category);

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => crawl_page(&*fetcher, &settings, &counters, &category, page).await,
                    Err(e) => Err(HarvestError::Task(format!("worker pool closed: {}", e))),
                };
                (page, result)
            });
        }

        let mut report = CategoryReport {
            category: category.name.clone(),
            pages: category.page_count,
            ..CategoryReport::default()
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((page, Ok(outcome))) => {
                    report.articles_failed += outcome.articles_failed;
                    report.rows_rejected += outcome.rows_rejected;

                    match self.store_batch(storage, category, &outcome.records) {
                        Ok(written) => {
                            report.records_written += written;
                            tracing::debug!(
                                "Stored {} records from page {} of {}",
                                written,
                                page,
                                category.name
                            );
                        }
                        Err(e) => {
                            report.pages_failed += 1;
                            self.page_failed(category, Some(page), &e);
                        }
                    }
                }
                Ok((page, Err(e))) => {
                    report.pages_failed += 1;
                    self.page_failed(category, Some(page), &e);
                }
                Err(join_error) => {
                    report.pages_failed += 1;
                    let e = HarvestError::Task(format!("page task aborted: {}", join_error));
                    self.page_failed(category, None, &e);
                }
            }
        }

        report
    }

    fn store_batch<S>(
        &self,
        storage: &mut S,
        category: &Category,
        records: &[Record],
    ) -> Result<u64, HarvestError>
    where
        S: Storage + ?Sized,
    {
        if records.is_empty() {
            return Ok(0);
        }

        let documents = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let written = storage.insert_many(&category.name, &documents)? as u64;
        self.counters.add_records_written(written);
        Ok(written)
    }

    fn page_failed(&self, category: &Category, page: Option<u32>, error: &HarvestError) {
        let count = self.counters.record_page_error();
        match page {
            Some(page) => tracing::error!(
                category = %category.name,
                page,
                url = %self.settings.page_path(category, page),
                "{} - Error processing page {}: {}",
                count,
                page,
                error
            ),
            None => tracing::error!(
                category = %category.name,
                url = %category.listing_path,
                "{} - Error processing a page: {}",
                count,
                error
            ),
        }
    }
}

/// Crawls one listing page and every article it lists
///
/// Fails only when the listing itself cannot be fetched and parsed within
/// the page retry policy.
async fn crawl_page<F>(
    fetcher: &F,
    settings: &CrawlSettings,
    counters: &CrawlCounters,
    category: &Category,
    page: u32,
) -> Result<PageOutcome, HarvestError>
where
    F: Fetcher + ?Sized,
{
    let page_path = settings.page_path(category, page);
    let listing = {
        let path = page_path.as_str();
        let detail_prefix = settings.site.detail_prefix.as_str();
        retry(&settings.page_retry, path, move || async move {
            let body = fetcher.fetch(path).await?;
            extract_listing(&body, detail_prefix)
        })
        .await?
    };

    let mut outcome = PageOutcome::default();

    for rejected in &listing.rejected {
        counters.record_rejected_row();
        outcome.rows_rejected += 1;
        tracing::warn!(
            category = %category.name,
            page,
            row = rejected.index,
            "On page {}, skipping row {}: {}",
            page,
            rejected.index,
            rejected.error
        );
    }

    for row in listing.rows {
        tokio::time::sleep(settings.jitter()).await;

        let detail = {
            let path = row.detail_path.as_str();
            retry(&settings.article_retry, path, move || async move {
                let body = fetcher.fetch(path).await?;
                extract_detail(&body)
            })
            .await
        };

        match detail {
            Ok(detail) => outcome.records.push(Record::merge(row, detail)),
            Err(e) => {
                let count = counters.record_article_error();
                outcome.articles_failed += 1;
                tracing::error!(
                    category = %category.name,
                    page,
                    url = %row.detail_path,
                    "{} - Error processing article {}: {}",
                    count,
                    row.title,
                    e
                );
            }
        }
    }

    Ok(outcome)
}
