//! Configuration module
//!
//! Combines the tracker's environment configuration with command-line
//! overrides.

use std::time::Duration;

use anyhow::{Context, Result};
use deckwatch_tracker::Config as TrackerConfig;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings for the tracking session
    pub tracker: TrackerConfig,
}

/// Values given on the command line, which win over the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub collection: Option<String>,
    pub interval_ms: Option<u64>,
}

impl Config {
    /// Loads the environment configuration and applies `overrides`
    pub fn load(overrides: Overrides) -> Result<Self> {
        let tracker = TrackerConfig::from_env().context("Failed to read configuration")?;
        Self::with_base(tracker, overrides)
    }

    fn with_base(mut tracker: TrackerConfig, overrides: Overrides) -> Result<Self> {
        if let Some(api_url) = overrides.api_url {
            tracker.api_url = api_url;
        }
        if let Some(collection) = overrides.collection {
            tracker.collection = collection;
        }
        if let Some(ms) = overrides.interval_ms {
            let interval = Duration::from_millis(ms);
            tracker.detail_interval = interval;
            tracker.list_interval = tracker.list_interval.max(interval);
        }

        tracker.validate().context("Invalid configuration")?;
        Ok(Self { tracker })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win() {
        let config = Config::with_base(
            TrackerConfig::default(),
            Overrides {
                api_url: Some("https://deals.example.com/api".to_string()),
                collection: Some("jobs".to_string()),
                interval_ms: Some(8000),
            },
        )
        .unwrap();

        assert_eq!(config.tracker.api_url, "https://deals.example.com/api");
        assert_eq!(config.tracker.collection, "jobs");
        assert_eq!(config.tracker.detail_interval, Duration::from_secs(8));
        // The list never polls faster than a detail view
        assert_eq!(config.tracker.list_interval, Duration::from_secs(8));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let result = Config::with_base(
            TrackerConfig::default(),
            Overrides {
                api_url: Some("localhost".to_string()),
                ..Overrides::default()
            },
        );
        assert!(result.is_err());
    }
}
