//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::storage::{RunRecord, Storage};
use crate::HarvestError;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Document count of every category collection, largest first
    pub collections: Vec<(String, u64)>,

    /// Number of categories in the catalog collection
    pub catalog_size: u64,

    /// Total number of harvested records (catalog excluded)
    pub total_records: u64,

    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `catalog_collection` - Collection holding the category catalog
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(
    storage: &dyn Storage,
    catalog_collection: &str,
) -> Result<HarvestStatistics, HarvestError> {
    let mut catalog_size = 0;
    let mut collections = Vec::new();

    for (name, count) in storage.collection_counts()? {
        if name == catalog_collection {
            catalog_size = count;
        } else {
            collections.push((name, count));
        }
    }

    collections.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let total_records = collections.iter().map(|(_, count)| count).sum();

    Ok(HarvestStatistics {
        collections,
        catalog_size,
        total_records,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Categories in catalog: {}", stats.catalog_size);
    println!("  Categories harvested: {}", stats.collections.len());
    println!("  Total records: {}", stats.total_records);
    println!();

    if !stats.collections.is_empty() {
        println!("Records by Category:");
        for (name, count) in &stats.collections {
            let percentage = if stats.total_records > 0 {
                (*count as f64 / stats.total_records as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", name, count, percentage);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run (#{}):", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Records written: {}", run.totals.records_written);
            println!("  Page errors: {}", run.totals.page_errors);
            println!("  Article errors: {}", run.totals.article_errors);
        }
        None => println!("No harvest runs recorded."),
    }
}
