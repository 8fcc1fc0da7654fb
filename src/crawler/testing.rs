//! In-memory fetcher for crawler unit tests

use crate::config::SiteConfig;
use crate::crawler::fetcher::Fetcher;
use crate::HarvestError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Default)]
struct Script {
    /// Failures served before the steady response
    pending_failures: u32,
    /// `None` fails every request
    body: Option<String>,
    /// Held until notified
    gate: Option<Arc<Notify>>,
    calls: u32,
}

/// Serves scripted bodies per path; unknown paths answer HTTP 404
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    /// Time every fetch takes
    latency: Duration,
    in_flight: AtomicU32,
    peak_in_flight: AtomicU32,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn respond(&self, path: &str, body: &str) {
        let mut scripts = self.scripts.lock().unwrap();
        scripts.entry(path.to_string()).or_default().body = Some(body.to_string());
    }

    pub fn fail(&self, path: &str) {
        let mut scripts = self.scripts.lock().unwrap();
        scripts.entry(path.to_string()).or_default().body = None;
    }

    /// Fails the next `times` requests for `path`, then serves `body`
    pub fn fail_then_respond(&self, path: &str, times: u32, body: &str) {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts.entry(path.to_string()).or_default();
        script.pending_failures = times;
        script.body = Some(body.to_string());
    }

    /// Holds every request for `path` until `gate` is notified
    pub fn gate(&self, path: &str, gate: Arc<Notify>) {
        let mut scripts = self.scripts.lock().unwrap();
        scripts.entry(path.to_string()).or_default().gate = Some(gate);
    }

    pub fn calls(&self, path: &str) -> u32 {
        let scripts = self.scripts.lock().unwrap();
        scripts.get(path).map(|s| s.calls).unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        let scripts = self.scripts.lock().unwrap();
        scripts.values().map(|s| s.calls).sum()
    }

    /// Highest number of fetches that were in progress at the same time
    pub fn peak_in_flight(&self) -> u32 {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, path: &str) -> Result<String, HarvestError> {
        let (result, gate) = {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.entry(path.to_string()).or_default();
            script.calls += 1;

            let failure = |reason: &str| HarvestError::Transport {
                url: path.to_string(),
                reason: reason.to_string(),
            };

            let result = if script.pending_failures > 0 {
                script.pending_failures -= 1;
                Err(failure("HTTP 503"))
            } else {
                match &script.body {
                    Some(body) => Ok(body.clone()),
                    None => Err(failure("HTTP 404")),
                }
            };
            (result, script.gate.clone())
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = gate {
            gate.notified().await;
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn test_site() -> SiteConfig {
    SiteConfig {
        base_url: "https://example.com".to_string(),
        user_agent: "Mozilla/5.0".to_string(),
        origin: None,
        encoding: "big5".to_string(),
        strict_decoding: false,
        request_timeout_secs: 30,
        index_path: "/doctor/Index1.php".to_string(),
        listing_template: "/doctor/All/history.php?UrlClass={name}&SortBy=q_no".to_string(),
        page_suffix: "&PageNo={page}".to_string(),
        detail_prefix: "/doctor/All/".to_string(),
    }
}
