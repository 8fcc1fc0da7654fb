//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building HTTP clients with the configured identification headers
//! - GET requests for site-relative paths
//! - Decoding bodies with the site's fixed text encoding (lenient by default)
//! - Error classification
//!
//! Fetching never retries; callers wrap it in a retry policy.

use crate::config::SiteConfig;
use crate::HarvestError;
use async_trait::async_trait;
use encoding_rs::Encoding;
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Source of page text for site-relative paths
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `path` and returns the decoded body
    ///
    /// # Errors
    ///
    /// * `HarvestError::Transport` - connection failure, timeout or non-2xx status
    /// * `HarvestError::Decode` - strict decoding is on and the body is not
    ///   valid in the expected encoding
    async fn fetch(&self, path: &str) -> Result<String, HarvestError>;
}

/// Fetcher backed by a reqwest client
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
    encoding: &'static Encoding,
    strict_decoding: bool,
}

impl HttpFetcher {
    /// Builds a fetcher for the configured site
    ///
    /// # Arguments
    ///
    /// * `site` - The site configuration
    ///
    /// # Returns
    ///
    /// * `Ok(HttpFetcher)` - Ready to fetch
    /// * `Err(HarvestError)` - Invalid base URL, encoding label or header value
    pub fn new(site: &SiteConfig) -> Result<Self, HarvestError> {
        let base_url = Url::parse(&site.base_url)?;
        let encoding = Encoding::for_label(site.encoding.as_bytes()).ok_or_else(|| {
            crate::ConfigError::Validation(format!("Unknown text encoding '{}'", site.encoding))
        })?;

        Ok(Self {
            client: build_http_client(site)?,
            base_url,
            encoding,
            strict_decoding: site.strict_decoding,
        })
    }

    fn transport_error(url: &Url, reason: impl Into<String>) -> HarvestError {
        HarvestError::Transport {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Builds an HTTP client with the site's identification headers and timeouts
pub fn build_http_client(site: &SiteConfig) -> Result<Client, HarvestError> {
    let mut headers = HeaderMap::new();
    if let Some(origin) = &site.origin {
        let value = HeaderValue::from_str(origin).map_err(|e| {
            crate::ConfigError::Validation(format!("Invalid origin header '{}': {}", origin, e))
        })?;
        headers.insert(ORIGIN, value);
    }

    let client = Client::builder()
        .user_agent(site.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(site.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<String, HarvestError> {
        let url = self.base_url.join(path)?;
        tracing::trace!("GET {}", url);

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err(Self::transport_error(&url, "Request timeout")),
            Err(e) if e.is_connect() => {
                return Err(Self::transport_error(&url, format!("Connection failed: {}", e)))
            }
            Err(e) => return Err(Self::transport_error(&url, e.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(Self::transport_error(&url, format!("HTTP {}", status.as_u16())));
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                Self::transport_error(&url, "Request timeout")
            } else {
                Self::transport_error(&url, e.to_string())
            }
        })?;

        decode_body(self.encoding, &bytes, self.strict_decoding, url.as_str())
    }
}

/// Decodes a response body with the site's fixed encoding
///
/// Malformed sequences become U+FFFD and are reported at warn level. With
/// `strict` set they fail the fetch with `HarvestError::Decode` instead.
pub fn decode_body(
    encoding: &'static Encoding,
    bytes: &[u8],
    strict: bool,
    url: &str,
) -> Result<String, HarvestError> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        if strict {
            return Err(HarvestError::Decode {
                url: url.to_string(),
                encoding: encoding.name(),
            });
        }
        tracing::warn!("Body of {} has bytes invalid in {}, replaced", url, encoding.name());
    }

    Ok(text.into_owned())
}
