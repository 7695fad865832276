//! Service configuration.
//!
//! Loaded from a TOML file; every key is optional and falls back to the
//! defaults below.
//!
//! # Example Configuration File
//!
//! ```toml
//! port = 8080
//! max_limit = 100
//! max_span_days = 8
//! standard_ttl_secs = 300
//! extended_ttl_secs = 43200
//! reaper_interval_ms = 1000
//! expensive_per_minute = 30
//! expensive_burst = 5
//! records_path = "contributions.json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use toprank_tasks::StoreConfig;

use crate::error::{Error, Result};
use crate::params::ValidationPolicy;

/// Configuration for a ranking service instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted `limit`.
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,

    /// Widest date range (in days) for reward-bearing or contribution-level
    /// queries.
    #[serde(default = "default_max_span_days")]
    pub max_span_days: i64,

    /// Retention of finished results computed without rewards.
    #[serde(default = "default_standard_ttl")]
    pub standard_ttl_secs: u64,

    /// Retention of finished results that include rewards.
    #[serde(default = "default_extended_ttl")]
    pub extended_ttl_secs: u64,

    /// How often the reaper applies due evictions.
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_ms: u64,

    /// Sustained rate for expensive queries that miss the cache.
    #[serde(default = "default_expensive_per_minute")]
    pub expensive_per_minute: u32,

    /// Burst allowance for expensive queries.
    #[serde(default = "default_expensive_burst")]
    pub expensive_burst: u32,

    /// JSON array of contribution records to serve from memory.
    #[serde(default)]
    pub records_path: Option<PathBuf>,
}

/// Ten years; longer retention is certainly a typo.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;
const MAX_SPAN_DAYS: i64 = 100 * 365;

fn default_port() -> u16 {
    3000
}

fn default_max_limit() -> u32 {
    100
}

fn default_max_span_days() -> i64 {
    8
}

fn default_standard_ttl() -> u64 {
    5 * 60
}

fn default_extended_ttl() -> u64 {
    12 * 60 * 60
}

fn default_reaper_interval() -> u64 {
    1_000
}

fn default_expensive_per_minute() -> u32 {
    30
}

fn default_expensive_burst() -> u32 {
    5
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_limit: default_max_limit(),
            max_span_days: default_max_span_days(),
            standard_ttl_secs: default_standard_ttl(),
            extended_ttl_secs: default_extended_ttl(),
            reaper_interval_ms: default_reaper_interval(),
            expensive_per_minute: default_expensive_per_minute(),
            expensive_burst: default_expensive_burst(),
            records_path: None,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies the `PORT` environment variable, if set and numeric.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        self
    }

    /// Rejects settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_limit == 0 {
            return Err(Error::Config("max_limit must be at least 1".to_string()));
        }
        if !(0..=MAX_SPAN_DAYS).contains(&self.max_span_days) {
            return Err(Error::Config(format!(
                "max_span_days must be between 0 and {MAX_SPAN_DAYS}"
            )));
        }
        if self.reaper_interval_ms == 0 {
            return Err(Error::Config(
                "reaper_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.standard_ttl_secs.max(self.extended_ttl_secs) > MAX_TTL_SECS {
            return Err(Error::Config("retention is out of range".to_string()));
        }
        Ok(())
    }

    /// Retention settings for the task store.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            standard_ttl: Duration::seconds(self.standard_ttl_secs as i64),
            extended_ttl: Duration::seconds(self.extended_ttl_secs as i64),
        }
    }

    /// Parameter limits for the admission gate.
    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            max_limit: self.max_limit,
            max_span: Duration::days(self.max_span_days),
        }
    }

    /// Reaper wake-up interval.
    pub fn reaper_interval(&self) -> StdDuration {
        StdDuration::from_millis(self.reaper_interval_ms)
    }
}
