//! Fork selection and block header preparation.

use tracing::info;
use zkseq_common::{Address, BlockHeader, ChainStore, B256};

use crate::{clock::Clock, error::SequencerError};

/// First fork with a bounded block gas limit.
const BOUNDED_GAS_LIMIT_FORK_ID: u64 = 8;

const BOUNDED_BLOCK_GAS_LIMIT: u64 = 1 << 50;

/// Block gas limit in force under `fork_id`.
pub fn gas_limit_for_fork(fork_id: u64) -> u64 {
    if fork_id >= BOUNDED_GAS_LIMIT_FORK_ID {
        BOUNDED_BLOCK_GAS_LIMIT
    } else {
        u64::MAX
    }
}

/// Determines the fork of the batch following `last_batch`.
///
/// A batch re-sequenced after a verification rollback keeps the fork that
/// was recorded for it. Otherwise the latest fork activated before the
/// batch applies, and an upgrade over the previous batch records the first
/// block of the new fork.
pub async fn prepare_fork_id<S>(
    store: &S,
    last_batch: u64,
    execution_at: u64,
) -> Result<u64, SequencerError>
where
    S: ChainStore + ?Sized,
{
    let next_batch = last_batch + 1;

    if store.just_unwound().await? == Some(next_batch) {
        if let Some(pinned) = store.fork_id(next_batch).await? {
            info!(batch = next_batch, fork_id = pinned, "re-sequencing batch with pinned fork");
            return Ok(pinned);
        }
    }

    let latest = store
        .fork_history()
        .await?
        .iter()
        .filter(|fork| next_batch > fork.batch)
        .map(|fork| fork.fork_id)
        .last()
        .ok_or(SequencerError::NoForkForBatch { batch: next_batch })?;

    let last_batch_fork = store.fork_id(last_batch).await?.unwrap_or_default();
    if last_batch_fork < latest {
        info!(from = last_batch_fork, to = latest, batch = next_batch, "upgrading fork id");
        store.write_fork_block_once(latest, execution_at + 1).await?;
    }

    Ok(latest)
}

/// Builds the header of the block following `parent_number`.
///
/// The state root is left empty until the block is executed. Returns the
/// header and the parent state root.
pub(crate) async fn prepare_header<S, C>(
    store: &S,
    clock: &C,
    parent_number: u64,
    delta_timestamp: Option<u32>,
    fork_id: u64,
    coinbase: Address,
) -> Result<(BlockHeader, B256), SequencerError>
where
    S: ChainStore + ?Sized,
    C: Clock + ?Sized,
{
    let parent = store
        .header_by_number(parent_number)
        .await?
        .ok_or(SequencerError::MissingBlock(parent_number))?;

    let timestamp = match delta_timestamp {
        Some(delta) => parent.timestamp + u64::from(delta),
        None => clock.unix_timestamp().max(parent.timestamp),
    };

    let header = BlockHeader {
        number: parent_number + 1,
        parent_hash: parent.hash(),
        coinbase,
        timestamp,
        gas_limit: gas_limit_for_fork(fork_id),
        state_root: B256::ZERO,
    };
    Ok((header, parent.state_root))
}

#[cfg(test)]
mod tests {
    use zkseq_common::test_utils::{empty_block, InMemoryChainStore};

    use super::*;
    use crate::clock::FixedClock;

    #[test]
    fn test_gas_limit_by_fork() {
        assert_eq!(gas_limit_for_fork(7), u64::MAX);
        assert_eq!(gas_limit_for_fork(8), 1 << 50);
        assert_eq!(gas_limit_for_fork(12), 1 << 50);
    }

    #[tokio::test]
    async fn test_fork_selection_uses_latest_activation() {
        let store = InMemoryChainStore::new(B256::ZERO, 0)
            .with_fork(7, 0)
            .with_fork(9, 5);
        store.write_fork_id(4, 7).await.unwrap();
        store.write_fork_id(5, 7).await.unwrap();

        assert_eq!(prepare_fork_id(&store, 4, 20).await.unwrap(), 7);
        assert_eq!(store.fork_block(9).await.unwrap(), None);

        assert_eq!(prepare_fork_id(&store, 5, 30).await.unwrap(), 9);
        assert_eq!(store.fork_block(9).await.unwrap(), Some(31));
    }

    #[tokio::test]
    async fn test_no_fork_is_an_error() {
        let store = InMemoryChainStore::new(B256::ZERO, 0).with_fork(9, 10);
        let err = prepare_fork_id(&store, 3, 3).await.unwrap_err();
        assert!(matches!(err, SequencerError::NoForkForBatch { batch: 4 }));
    }

    #[tokio::test]
    async fn test_pinned_fork_after_rollback_skips_upgrade() {
        let store = InMemoryChainStore::new(B256::ZERO, 0)
            .with_fork(7, 0)
            .with_fork(9, 2);
        store.write_fork_id(2, 7).await.unwrap();
        store.write_fork_id(3, 7).await.unwrap();
        store.write_just_unwound(3).await.unwrap();

        assert_eq!(prepare_fork_id(&store, 2, 10).await.unwrap(), 7);
        assert_eq!(store.fork_block(9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prepare_header() {
        let store = InMemoryChainStore::new(B256::repeat_byte(1), 1_000);
        store.append_block(empty_block(1, 1_010), 1).await.unwrap();

        let (header, parent_root) =
            prepare_header(&store, &FixedClock(2_000), 1, None, 9, Address::repeat_byte(5))
                .await
                .unwrap();
        assert_eq!(header.number, 2);
        assert_eq!(header.timestamp, 2_000);
        assert_eq!(header.gas_limit, 1 << 50);
        assert_eq!(header.parent_hash, empty_block(1, 1_010).header.hash());
        assert_eq!(parent_root, B256::with_last_byte(1));

        let (header, _) = prepare_header(&store, &FixedClock(2_000), 1, Some(4), 7, Address::ZERO)
            .await
            .unwrap();
        assert_eq!(header.timestamp, 1_014);
        assert_eq!(header.gas_limit, u64::MAX);

        // a clock behind the parent never produces a decreasing timestamp
        let (header, _) = prepare_header(&store, &FixedClock(5), 1, None, 9, Address::ZERO)
            .await
            .unwrap();
        assert_eq!(header.timestamp, 1_010);

        let err = prepare_header(&store, &FixedClock(0), 7, None, 9, Address::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, SequencerError::MissingBlock(7)));
    }
}
