//! Consult-Harvest: a paced harvester for paginated Q&A catalogs
//!
//! This crate discovers the category catalog of a consultation site, walks
//! every category's paginated listing on a bounded worker pool, fetches each
//! listed article's detail page and stores the merged records in a
//! per-category document collection.

pub mod config;
pub mod crawler;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for Consult-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connection failure, timeout or non-success status
    #[error("Transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    /// Response body is not valid in the expected text encoding
    #[error("Body of {url} is not valid {encoding}")]
    Decode { url: String, encoding: &'static str },

    /// Expected page structure is absent
    #[error("Parse error: {0}")]
    Parse(String),

    /// A worker task ended without producing a result
    #[error("Task error: {0}")]
    Task(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Shorthand for a structural parse failure
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Consult-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{ArticleDetail, Category, ListingRow, Record};
