//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{RunRecord, RunTotals};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for document store backends
///
/// Documents are schemaless JSON values grouped into named collections.
/// There is no uniqueness enforcement: inserting the same document twice
/// stores it twice.
pub trait Storage {
    // ===== Collections =====

    /// Counts the documents in a collection (0 for an unknown collection)
    fn count(&self, collection: &str) -> StorageResult<u64>;

    /// Appends documents to a collection, returning how many were written
    fn insert_many(&mut self, collection: &str, documents: &[Value]) -> StorageResult<usize>;

    /// Reads every document of a collection in insertion order
    fn find_all(&self, collection: &str) -> StorageResult<Vec<Value>>;

    /// Lists every non-empty collection with its document count, sorted by name
    fn collection_counts(&self) -> StorageResult<Vec<(String, u64)>>;

    // ===== Run Management =====

    /// Creates a new run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as completed and records its final totals
    fn complete_run(&mut self, run_id: i64, totals: &RunTotals) -> StorageResult<()>;

    /// Marks a run as failed and records the totals reached so far
    fn fail_run(&mut self, run_id: i64, totals: &RunTotals) -> StorageResult<()>;
}
