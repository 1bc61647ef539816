use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Age after which a failing verification request stops being retried.
const DEFAULT_STALENESS_TIMEOUT_SECS: u64 = 30 * 60;

/// Margin added to the last block timestamp to form the executor's
/// timestamp limit.
const DEFAULT_TIMESTAMP_LIMIT_MARGIN_SECS: u64 = 300;

/// Poll interval while waiting for executor queues to drain.
const DEFAULT_DRAIN_POLL_INTERVAL_MS: u64 = 1;

fn default_staleness_timeout_secs() -> u64 {
    DEFAULT_STALENESS_TIMEOUT_SECS
}

fn default_timestamp_limit_margin_secs() -> u64 {
    DEFAULT_TIMESTAMP_LIMIT_MARGIN_SECS
}

fn default_drain_poll_interval_ms() -> u64 {
    DEFAULT_DRAIN_POLL_INTERVAL_MS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    #[serde(default = "default_staleness_timeout_secs")]
    pub staleness_timeout_secs: u64,

    #[serde(default = "default_timestamp_limit_margin_secs")]
    pub timestamp_limit_margin_secs: u64,

    #[serde(default = "default_drain_poll_interval_ms")]
    pub drain_poll_interval_ms: u64,

    /// Executor endpoints. With none configured every batch is accepted.
    #[serde(default)]
    pub executor_urls: Vec<String>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            staleness_timeout_secs: DEFAULT_STALENESS_TIMEOUT_SECS,
            timestamp_limit_margin_secs: DEFAULT_TIMESTAMP_LIMIT_MARGIN_SECS,
            drain_poll_interval_ms: DEFAULT_DRAIN_POLL_INTERVAL_MS,
            executor_urls: Vec::new(),
        }
    }
}

impl VerifierConfig {
    pub fn with_staleness_timeout_secs(mut self, secs: u64) -> Self {
        self.staleness_timeout_secs = secs;
        self
    }

    pub fn with_executor_urls(mut self, urls: Vec<String>) -> Self {
        self.executor_urls = urls;
        self
    }

    pub fn staleness_timeout(&self) -> Duration {
        Duration::from_secs(self.staleness_timeout_secs)
    }

    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }

    pub fn has_executors(&self) -> bool {
        !self.executor_urls.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.staleness_timeout_secs == 0 {
            return Err(ConfigError::invalid("staleness_timeout_secs must be non-zero"));
        }
        if self.drain_poll_interval_ms == 0 {
            return Err(ConfigError::invalid("drain_poll_interval_ms must be non-zero"));
        }
        Ok(())
    }
}
