//! Tracker configuration
//!
//! Defines every tunable of a tracking session: where the service lives,
//! how often jobs and the list are polled, and how failures back off.

use std::time::Duration;

use anyhow::Context;

use crate::poller::policy::{Backoff, IntervalPolicy};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Tracker configuration
///
/// Intervals are configurable so the same client can be tuned for a local
/// service or a slow remote one.
#[derive(Debug, Clone)]
pub struct Config {
    /// Service base URL (e.g., "http://localhost:8000/api")
    pub api_url: String,

    /// Path segment the service mounts jobs under
    pub collection: String,

    /// How often a job on screen is refreshed while it is in progress
    pub detail_interval: Duration,

    /// How often the job list is refreshed while any listed job is in progress
    pub list_interval: Duration,

    /// List cadence once every job is terminal; `None` stops list polling
    pub list_settled_interval: Option<Duration>,

    /// Floor for every polling interval
    pub min_interval: Duration,

    /// Retry spacing after transient failures
    pub backoff: Backoff,

    /// Consecutive transient failures before the renderer is told
    pub max_transient_failures: u32,

    /// Per-request timeout; `None` waits as long as the transport does
    pub request_timeout: Option<Duration>,

    /// Largest document accepted for submission
    pub max_upload_bytes: u64,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(api_url: String) -> Self {
        Self {
            api_url,
            collection: deckwatch_client::DEFAULT_COLLECTION.to_string(),
            detail_interval: Duration::from_secs(2),
            list_interval: Duration::from_secs(5),
            list_settled_interval: None,
            min_interval: Duration::from_millis(500),
            backoff: Backoff::Exponential {
                max: Duration::from_secs(30),
            },
            max_transient_failures: 5,
            request_timeout: None,
            max_upload_bytes: deckwatch_client::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Every variable is optional:
    /// - DECKWATCH_API_URL (default: http://localhost:8000/api)
    /// - DECKWATCH_COLLECTION (default: deals)
    /// - DECKWATCH_DETAIL_INTERVAL_MS (default: 2000)
    /// - DECKWATCH_LIST_INTERVAL_MS (default: 5000)
    /// - DECKWATCH_LIST_SETTLED_INTERVAL_MS (default: unset, list stops)
    /// - DECKWATCH_MIN_INTERVAL_MS (default: 500)
    /// - DECKWATCH_BACKOFF (`fixed` or `exponential`, default: exponential)
    /// - DECKWATCH_MAX_BACKOFF_MS (default: 30000)
    /// - DECKWATCH_MAX_TRANSIENT_FAILURES (default: 5)
    /// - DECKWATCH_REQUEST_TIMEOUT_SECS (default: unset)
    /// - DECKWATCH_MAX_UPLOAD_BYTES (default: 10485760)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_url = lookup("DECKWATCH_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let mut config = Self::new(api_url);

        let parse = |key: &str| -> anyhow::Result<Option<u64>> {
            lookup(key)
                .map(|value| {
                    value
                        .trim()
                        .parse::<u64>()
                        .with_context(|| format!("{} must be a whole number, got {:?}", key, value))
                })
                .transpose()
        };

        if let Some(collection) = lookup("DECKWATCH_COLLECTION") {
            config.collection = collection;
        }
        if let Some(ms) = parse("DECKWATCH_DETAIL_INTERVAL_MS")? {
            config.detail_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse("DECKWATCH_LIST_INTERVAL_MS")? {
            config.list_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse("DECKWATCH_LIST_SETTLED_INTERVAL_MS")? {
            config.list_settled_interval = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = parse("DECKWATCH_MIN_INTERVAL_MS")? {
            config.min_interval = Duration::from_millis(ms);
        }

        let max_backoff = parse("DECKWATCH_MAX_BACKOFF_MS")?.map(Duration::from_millis);
        config.backoff = match lookup("DECKWATCH_BACKOFF").as_deref().map(str::trim) {
            None | Some("exponential") => Backoff::Exponential {
                max: max_backoff.unwrap_or(Duration::from_secs(30)),
            },
            Some("fixed") => Backoff::Fixed,
            Some(other) => {
                anyhow::bail!("DECKWATCH_BACKOFF must be 'fixed' or 'exponential', got {:?}", other)
            }
        };

        if let Some(n) = parse("DECKWATCH_MAX_TRANSIENT_FAILURES")? {
            config.max_transient_failures =
                u32::try_from(n).context("DECKWATCH_MAX_TRANSIENT_FAILURES is too large")?;
        }
        if let Some(secs) = parse("DECKWATCH_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(bytes) = parse("DECKWATCH_MAX_UPLOAD_BYTES")? {
            config.max_upload_bytes = bytes;
        }

        Ok(config)
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_intervals(mut self, detail: Duration, list: Duration) -> Self {
        self.detail_interval = detail;
        self.list_interval = list;
        self
    }

    /// Keep refreshing a settled list at `interval` instead of stopping
    pub fn with_list_settled_interval(mut self, interval: Duration) -> Self {
        self.list_settled_interval = Some(interval);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Scheduling policy derived from this configuration
    pub fn interval_policy(&self) -> IntervalPolicy {
        IntervalPolicy {
            min_interval: self.min_interval,
            backoff: self.backoff,
            settled_interval: self.list_settled_interval,
            max_transient_failures: self.max_transient_failures,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_url.is_empty() {
            anyhow::bail!("api_url cannot be empty");
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("api_url must start with http:// or https://");
        }

        if self.collection.trim_matches('/').is_empty() {
            anyhow::bail!("collection cannot be empty");
        }

        if self.min_interval.is_zero() {
            anyhow::bail!("min_interval must be greater than 0");
        }

        if self.detail_interval < self.min_interval {
            anyhow::bail!("detail_interval cannot be shorter than min_interval");
        }

        // A job on screen never refreshes slower than the list it came from
        if self.detail_interval > self.list_interval {
            anyhow::bail!("detail_interval cannot be longer than list_interval");
        }

        if let Some(settled) = self.list_settled_interval {
            if settled < self.list_interval {
                anyhow::bail!("list_settled_interval cannot be shorter than list_interval");
            }
        }

        if let Backoff::Exponential { max } = self.backoff {
            if max < self.list_interval {
                anyhow::bail!("max backoff cannot be shorter than list_interval");
            }
        }

        if self.max_transient_failures == 0 {
            anyhow::bail!("max_transient_failures must be greater than 0");
        }

        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL.to_string())
    }
}
