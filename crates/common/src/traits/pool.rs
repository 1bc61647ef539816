use std::collections::HashSet;

use alloy_primitives::B256;
use async_trait::async_trait;

use crate::L2Transaction;

/// Source of pending transactions for live sequencing.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait TxPool: Send + Sync {
    /// Stops the pool from flushing pending transactions while a batch of
    /// candidates is being yielded.
    fn lock_flusher(&self);

    fn unlock_flusher(&self);

    /// Returns up to `max` of the best pending transactions, skipping any
    /// whose hash is in `exclude`.
    async fn yield_best(
        &self,
        max: usize,
        exclude: &HashSet<B256>,
    ) -> eyre::Result<Vec<L2Transaction>>;

    /// Drops transactions that made it into a block.
    async fn remove_mined(&self, hashes: &[B256]) -> eyre::Result<()>;
}
