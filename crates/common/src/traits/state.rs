use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;

/// Merkle state-commitment engine.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait StateCommitment: Send + Sync {
    /// Witness proving the pre-state needed to replay blocks
    /// `start_block..=end_block`.
    async fn witness(&self, start_block: u64, end_block: u64) -> eyre::Result<Bytes>;

    /// Current state root.
    async fn root(&self) -> eyre::Result<B256>;
}
