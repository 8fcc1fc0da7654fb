use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Consult-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub output: OutputConfig,
}

/// Remote site layout and transport settings
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Scheme and host every relative path is appended to
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Browser-like identification sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Optional `Origin` header value
    #[serde(default)]
    pub origin: Option<String>,

    /// Text encoding label of every page (e.g. "big5")
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Fail a fetch on any byte invalid in `encoding` instead of replacing it
    #[serde(rename = "strict-decoding", default)]
    pub strict_decoding: bool,

    /// Absolute timeout of a single request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Path of the page listing every category tile
    #[serde(rename = "index-path", default = "default_index_path")]
    pub index_path: String,

    /// Path of page 1 of a category listing; `{name}` is the category name
    #[serde(rename = "listing-template", default = "default_listing_template")]
    pub listing_template: String,

    /// Appended to a listing path to select a page; `{page}` is the page number
    #[serde(rename = "page-suffix", default = "default_page_suffix")]
    pub page_suffix: String,

    /// Prefix joined with the relative link of each listing row
    #[serde(rename = "detail-prefix", default = "default_detail_prefix")]
    pub detail_prefix: String,
}

impl SiteConfig {
    /// Listing path of page 1 for the named category
    pub fn listing_path(&self, category_name: &str) -> String {
        self.listing_template.replace("{name}", category_name)
    }

    /// Suffix selecting `page` of a listing
    pub fn page_suffix_for(&self, page: u32) -> String {
        self.page_suffix.replace("{page}", &page.to_string())
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of listing pages crawled at once within a category
    #[serde(rename = "max-concurrent-pages", default = "default_max_concurrent_pages")]
    pub max_concurrent_pages: u32,

    /// Lower bound of the random pause before each detail fetch (milliseconds)
    #[serde(rename = "jitter-min-ms", default = "default_jitter_min")]
    pub jitter_min_ms: u64,

    /// Upper bound of the random pause before each detail fetch (milliseconds)
    #[serde(rename = "jitter-max-ms", default = "default_jitter_max")]
    pub jitter_max_ms: u64,

    /// Category names to crawl; empty means all
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Retry policies for the two retried operations
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "RetryPolicyConfig::article_default")]
    pub article: RetryPolicyConfig,

    #[serde(default = "RetryPolicyConfig::page_default")]
    pub page: RetryPolicyConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            article: RetryPolicyConfig::article_default(),
            page: RetryPolicyConfig::page_default(),
        }
    }
}

/// One backoff policy: `base-delay-ms + step-ms * attempt` between attempts
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicyConfig {
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    #[serde(rename = "step-ms", default)]
    pub step_ms: u64,
}

impl RetryPolicyConfig {
    /// Linear backoff used around detail fetches
    pub fn article_default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 5000,
            step_ms: 5000,
        }
    }

    /// Constant delay used around listing page fetches
    pub fn page_default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 5000,
            step_ms: 0,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Collection holding the discovered categories
    #[serde(rename = "catalog-collection", default = "default_catalog_collection")]
    pub catalog_collection: String,

    /// Optional log file receiving a copy of every event
    #[serde(rename = "log-path", default)]
    pub log_path: Option<String>,
}

impl CrawlerConfig {
    pub fn jitter_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.jitter_min_ms),
            Duration::from_millis(self.jitter_max_ms),
        )
    }
}

fn default_encoding() -> String {
    "big5".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_index_path() -> String {
    "/doctor/Index1.php".to_string()
}

fn default_listing_template() -> String {
    "/doctor/All/history.php?UrlClass={name}&SortBy=q_no".to_string()
}

fn default_page_suffix() -> String {
    "&PageNo={page}".to_string()
}

fn default_detail_prefix() -> String {
    "/doctor/All/".to_string()
}

fn default_max_concurrent_pages() -> u32 {
    24
}

fn default_jitter_min() -> u64 {
    2500
}

fn default_jitter_max() -> u64 {
    5000
}

fn default_catalog_collection() -> String {
    "categories".to_string()
}
