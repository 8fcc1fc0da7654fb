use crate::config::types::{Config, CrawlerConfig, OutputConfig, RetryPolicyConfig, SiteConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_crawler_config(&config.crawler)?;
    validate_retry_policy("retry.article", &config.retry.article)?;
    validate_retry_policy("retry.page", &config.retry.page)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the site layout and transport settings
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if encoding_rs::Encoding::for_label(config.encoding.as_bytes()).is_none() {
        return Err(ConfigError::Validation(format!(
            "Unknown text encoding '{}'",
            config.encoding
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if !config.listing_template.contains("{name}") {
        return Err(ConfigError::Validation(format!(
            "listing_template must contain '{{name}}', got '{}'",
            config.listing_template
        )));
    }

    if !config.page_suffix.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "page_suffix must contain '{{page}}', got '{}'",
            config.page_suffix
        )));
    }

    if !config.index_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "index_path must start with '/', got '{}'",
            config.index_path
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_pages < 1 || config.max_concurrent_pages > 256 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_pages must be between 1 and 256, got {}",
            config.max_concurrent_pages
        )));
    }

    if config.jitter_min_ms > config.jitter_max_ms {
        return Err(ConfigError::Validation(format!(
            "jitter_min_ms ({}) must not exceed jitter_max_ms ({})",
            config.jitter_min_ms, config.jitter_max_ms
        )));
    }

    if config.categories.iter().any(|c| c.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "categories cannot contain empty names".to_string(),
        ));
    }

    Ok(())
}

/// Validates one retry policy
fn validate_retry_policy(section: &str, policy: &RetryPolicyConfig) -> Result<(), ConfigError> {
    if policy.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "{}.max_attempts must be >= 1, got {}",
            section, policy.max_attempts
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.catalog_collection.trim().is_empty() {
        return Err(ConfigError::Validation(
            "catalog_collection cannot be empty".to_string(),
        ));
    }

    if matches!(&config.log_path, Some(p) if p.is_empty()) {
        return Err(ConfigError::Validation(
            "log_path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}
