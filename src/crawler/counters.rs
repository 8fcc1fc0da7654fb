//! Run-scoped failure accounting shared by every page task

use crate::storage::RunTotals;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters accumulated over a whole run
///
/// Shared through an `Arc` with every page task. Each `record_*` method
/// returns the updated total, which numbers the matching log line.
#[derive(Debug, Default)]
pub struct CrawlCounters {
    page_errors: AtomicU64,
    article_errors: AtomicU64,
    records_written: AtomicU64,
    rows_rejected: AtomicU64,
}

impl CrawlCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_page_error(&self) -> u64 {
        self.page_errors.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn record_article_error(&self) -> u64 {
        self.article_errors.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn record_rejected_row(&self) -> u64 {
        self.rows_rejected.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn add_records_written(&self, count: u64) -> u64 {
        self.records_written.fetch_add(count, Ordering::SeqCst) + count
    }

    pub fn page_errors(&self) -> u64 {
        self.page_errors.load(Ordering::SeqCst)
    }

    pub fn article_errors(&self) -> u64 {
        self.article_errors.load(Ordering::SeqCst)
    }

    pub fn rows_rejected(&self) -> u64 {
        self.rows_rejected.load(Ordering::SeqCst)
    }

    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::SeqCst)
    }

    /// Snapshot in the shape stored on the run row
    pub fn totals(&self) -> RunTotals {
        RunTotals {
            page_errors: self.page_errors(),
            article_errors: self.article_errors(),
            records_written: self.records_written(),
        }
    }
}
