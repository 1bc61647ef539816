use std::collections::BTreeMap;

use alloy_primitives::B256;
use async_trait::async_trait;

use crate::{
    BlockHeader, ForkActivation, L2Block, RecoveredBatch, Stage, StorageError, UnwindReason,
};

/// Point-in-time read-only view of the chain.
///
/// Every read made through one view observes the same state, regardless of
/// writes to the store after the view was taken.
pub trait ChainView: Send + Sync {
    fn header_by_number(&self, number: u64) -> Result<Option<BlockHeader>, StorageError>;

    fn block_by_number(&self, number: u64) -> Result<Option<L2Block>, StorageError>;

    /// Batch the block was sequenced into.
    fn batch_of_block(&self, number: u64) -> Result<Option<u64>, StorageError>;

    fn highest_block(&self) -> Result<u64, StorageError>;
}

/// Persistence for the sequencer.
#[async_trait]
pub trait ChainStore: Send + Sync {
    type View: ChainView + 'static;

    /// Takes a consistent snapshot of the chain.
    fn view(&self) -> Result<Self::View, StorageError>;

    async fn header_by_number(&self, number: u64) -> Result<Option<BlockHeader>, StorageError>;

    async fn block_by_number(&self, number: u64) -> Result<Option<L2Block>, StorageError>;

    /// Appends `block` on top of the tip and records it as part of `batch`.
    async fn append_block(&self, block: L2Block, batch: u64) -> Result<(), StorageError>;

    async fn blocks_in_batch(&self, batch: u64) -> Result<Vec<u64>, StorageError>;

    async fn stage_progress(&self, stage: Stage) -> Result<u64, StorageError>;

    async fn save_stage_progress(&self, stage: Stage, value: u64) -> Result<(), StorageError>;

    /// Persists the used amount per counter dimension for `batch`.
    async fn write_batch_counters(
        &self,
        batch: u64,
        counters: BTreeMap<String, i64>,
    ) -> Result<(), StorageError>;

    async fn batch_counters(&self, batch: u64)
        -> Result<Option<BTreeMap<String, i64>>, StorageError>;

    /// Known fork activations, in ascending batch order.
    async fn fork_history(&self) -> Result<Vec<ForkActivation>, StorageError>;

    async fn fork_id(&self, batch: u64) -> Result<Option<u64>, StorageError>;

    async fn write_fork_id(&self, batch: u64, fork_id: u64) -> Result<(), StorageError>;

    /// Records the first block of `fork_id`. Later writes for the same fork
    /// are ignored.
    async fn write_fork_block_once(&self, fork_id: u64, block: u64) -> Result<(), StorageError>;

    async fn fork_block(&self, fork_id: u64) -> Result<Option<u64>, StorageError>;

    /// Marks that the chain was unwound because `batch` failed verification.
    async fn write_just_unwound(&self, batch: u64) -> Result<(), StorageError>;

    async fn just_unwound(&self) -> Result<Option<u64>, StorageError>;
}

/// Persisted L1 batch data used by recovery.
#[async_trait]
pub trait RecoveryStore: Send + Sync {
    async fn recovered_batch(&self, batch: u64) -> Result<Option<RecoveredBatch>, StorageError>;
}

/// Generic chain unwind mechanism.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait Unwinder: Send + Sync {
    /// Unwinds the chain so that `target` becomes the tip. `bad_block` is the
    /// hash of the block that caused the unwind.
    async fn unwind_to(
        &self,
        target: u64,
        bad_block: B256,
        reason: UnwindReason,
    ) -> Result<(), StorageError>;
}
