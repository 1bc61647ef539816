use alloy_primitives::Bytes;
use async_trait::async_trait;

use crate::L2Block;

/// Wire encoding of the block data stream.
#[cfg_attr(feature = "test-utils", mockall::automock)]
pub trait DataStreamEncoder: Send + Sync {
    /// Encodes `block` as part of `batch`. A batch bookmark is emitted when
    /// `batch` differs from `previous_batch`.
    fn encode(&self, block: &L2Block, batch: u64, previous_batch: u64) -> eyre::Result<Bytes>;
}

/// Downstream consumer of confirmed blocks.
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait DataStreamPublisher: Send + Sync {
    async fn publish(&self, block_number: u64, entries: Bytes) -> eyre::Result<()>;
}
