use std::time::Duration;

use serde::{Deserialize, Serialize};
use zkseq_common::Address;

use crate::ConfigError;

/// Default time a block stays open for transactions.
const DEFAULT_BLOCK_SEAL_TIME_MS: u64 = 6_000;

/// Default time a batch stays open for blocks.
const DEFAULT_BATCH_SEAL_TIME_MS: u64 = 12_000;

/// Default wait between pool polls when no transactions arrived.
const DEFAULT_POOL_POLL_INTERVAL_MS: u64 = 50;

/// Default interval of the "still waiting" log line.
const DEFAULT_LOG_INTERVAL_MS: u64 = 10_000;

/// Default number of transactions requested from the pool per poll.
const DEFAULT_YIELD_SIZE: usize = 100;

/// Batch L2 data limit enforced by the rollup contract.
const DEFAULT_MAX_BATCH_L2_DATA_BYTES: usize = 120_000;

/// Default maximum SMT level of the state tree.
const DEFAULT_SMT_MAX_LEVEL: u32 = 64;

/// Effective gas percentage applied to pool transactions.
const DEFAULT_EFFECTIVE_GAS_PERCENTAGE: u8 = 255;

fn default_block_seal_time_ms() -> u64 {
    DEFAULT_BLOCK_SEAL_TIME_MS
}

fn default_batch_seal_time_ms() -> u64 {
    DEFAULT_BATCH_SEAL_TIME_MS
}

fn default_pool_poll_interval_ms() -> u64 {
    DEFAULT_POOL_POLL_INTERVAL_MS
}

fn default_log_interval_ms() -> u64 {
    DEFAULT_LOG_INTERVAL_MS
}

fn default_yield_size() -> usize {
    DEFAULT_YIELD_SIZE
}

fn default_max_batch_l2_data_bytes() -> usize {
    DEFAULT_MAX_BATCH_L2_DATA_BYTES
}

fn default_smt_max_level() -> u32 {
    DEFAULT_SMT_MAX_LEVEL
}

fn default_effective_gas_percentage() -> u8 {
    DEFAULT_EFFECTIVE_GAS_PERCENTAGE
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerConfig {
    #[serde(default = "default_block_seal_time_ms")]
    pub block_seal_time_ms: u64,

    #[serde(default = "default_batch_seal_time_ms")]
    pub batch_seal_time_ms: u64,

    #[serde(default = "default_pool_poll_interval_ms")]
    pub pool_poll_interval_ms: u64,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,

    /// Transactions requested from the pool per poll.
    #[serde(default = "default_yield_size")]
    pub yield_size: usize,

    #[serde(default = "default_max_batch_l2_data_bytes")]
    pub max_batch_l2_data_bytes: usize,

    #[serde(default = "default_smt_max_level")]
    pub smt_max_level: u32,

    #[serde(default = "default_effective_gas_percentage")]
    pub effective_gas_percentage: u8,

    /// Address credited with the fees of sequenced blocks.
    #[serde(default)]
    pub coinbase: Address,

    /// Replay batches from persisted L1 data instead of the pool.
    #[serde(default)]
    pub l1_recovery: bool,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            block_seal_time_ms: DEFAULT_BLOCK_SEAL_TIME_MS,
            batch_seal_time_ms: DEFAULT_BATCH_SEAL_TIME_MS,
            pool_poll_interval_ms: DEFAULT_POOL_POLL_INTERVAL_MS,
            log_interval_ms: DEFAULT_LOG_INTERVAL_MS,
            yield_size: DEFAULT_YIELD_SIZE,
            max_batch_l2_data_bytes: DEFAULT_MAX_BATCH_L2_DATA_BYTES,
            smt_max_level: DEFAULT_SMT_MAX_LEVEL,
            effective_gas_percentage: DEFAULT_EFFECTIVE_GAS_PERCENTAGE,
            coinbase: Address::ZERO,
            l1_recovery: false,
        }
    }
}

impl SequencerConfig {
    pub fn with_block_seal_time_ms(mut self, ms: u64) -> Self {
        self.block_seal_time_ms = ms;
        self
    }

    pub fn with_batch_seal_time_ms(mut self, ms: u64) -> Self {
        self.batch_seal_time_ms = ms;
        self
    }

    pub fn with_pool_poll_interval_ms(mut self, ms: u64) -> Self {
        self.pool_poll_interval_ms = ms;
        self
    }

    pub fn with_yield_size(mut self, yield_size: usize) -> Self {
        self.yield_size = yield_size;
        self
    }

    pub fn with_max_batch_l2_data_bytes(mut self, bytes: usize) -> Self {
        self.max_batch_l2_data_bytes = bytes;
        self
    }

    pub fn with_coinbase(mut self, coinbase: Address) -> Self {
        self.coinbase = coinbase;
        self
    }

    pub fn with_l1_recovery(mut self, l1_recovery: bool) -> Self {
        self.l1_recovery = l1_recovery;
        self
    }

    pub fn block_seal_time(&self) -> Duration {
        Duration::from_millis(self.block_seal_time_ms)
    }

    pub fn batch_seal_time(&self) -> Duration {
        Duration::from_millis(self.batch_seal_time_ms)
    }

    pub fn pool_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pool_poll_interval_ms)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_millis(self.log_interval_ms)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.block_seal_time_ms == 0 || self.batch_seal_time_ms == 0 {
            return Err(ConfigError::invalid("seal times must be non-zero"));
        }
        if self.pool_poll_interval_ms == 0 || self.log_interval_ms == 0 {
            return Err(ConfigError::invalid("poll and log intervals must be non-zero"));
        }
        if self.yield_size == 0 {
            return Err(ConfigError::invalid("yield_size must be non-zero"));
        }
        Ok(())
    }
}
