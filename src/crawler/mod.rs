//! Crawler module for catalog discovery and page harvesting
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with forced text decoding
//! - HTML extraction of categories, listing rows and article details
//! - Retry with linear backoff
//! - Bounded-concurrency page crawling
//! - Overall run coordination

mod coordinator;
mod counters;
mod discovery;
mod extractor;
mod fetcher;
mod model;
mod pages;
mod retry;

#[cfg(test)]
mod testing;

pub use coordinator::{run_harvest, select_categories, Coordinator, RunSummary};
pub use counters::CrawlCounters;
pub use discovery::{discover_and_persist_categories, extract_categories};
pub use extractor::{
    clean_category_name, extract_detail, extract_listing, parse_category_tiles, parse_page_count,
    ListingPage, RejectedRow,
};
pub use fetcher::{build_http_client, decode_body, Fetcher, HttpFetcher};
pub use model::{ArticleDetail, Category, ListingRow, Record};
pub use pages::{CategoryReport, CrawlSettings, PageCrawler};
pub use retry::{retry, RetryPolicy};
