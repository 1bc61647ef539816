//! Where the transactions of a block come from.

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use tracing::{debug, warn};
use zkseq_common::{Address, DecodedBlock, L2Transaction, RecoveryStore, TxPool, B256};

use crate::error::SequencerError;

/// Effective gas percentage assumed when recovered data carries none.
const FULL_EFFECTIVE_GAS_PERCENTAGE: u8 = u8::MAX;

/// Block-level parameters handed out by a [`CandidateSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStart {
    /// Offset from the parent timestamp. `None` stamps the block with the
    /// current time.
    pub delta_timestamp: Option<u32>,
    pub l1_info_tree_index: u32,
}

impl BlockStart {
    pub fn live() -> Self {
        Self {
            delta_timestamp: None,
            l1_info_tree_index: 0,
        }
    }

    /// Whether opening the block proves an L1 info tree leaf.
    pub fn verify_merkle_proof(&self) -> bool {
        self.l1_info_tree_index != 0
    }
}

/// A transaction offered for inclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub tx: L2Transaction,
    pub effective_gas_percentage: u8,
}

/// Ordered supply of candidate transactions for one batch.
#[async_trait]
pub trait CandidateSource: Send {
    /// Whether candidates replay previously decided data. Replayed blocks
    /// are reproduced as they were, overflow included.
    fn is_replay(&self) -> bool;

    /// Coinbase mandated by the source, if any.
    fn coinbase(&self) -> Option<Address>;

    /// Parameters of the next block, or `None` once the source has no more
    /// blocks for this batch.
    fn next_block(&mut self) -> Option<BlockStart>;

    /// Next candidates for the open block. Empty when nothing is available
    /// right now.
    async fn next_candidates(&mut self) -> Result<Vec<Candidate>, SequencerError>;

    /// Makes candidates that were handed out but not included available
    /// again.
    fn release(&mut self, hashes: &[B256]);

    /// Called once a block including `hashes` has been persisted.
    async fn commit(&mut self, hashes: &[B256]) -> Result<(), SequencerError>;
}

/// Live candidates from the transaction pool.
#[derive(Debug)]
pub struct PoolSource<P> {
    pool: Arc<P>,
    yield_size: usize,
    effective_gas_percentage: u8,
    yielded: HashSet<B256>,
}

impl<P: TxPool> PoolSource<P> {
    pub fn new(pool: Arc<P>, yield_size: usize, effective_gas_percentage: u8) -> Self {
        Self {
            pool,
            yield_size,
            effective_gas_percentage,
            yielded: HashSet::new(),
        }
    }

    /// Hashes handed out and not released.
    pub fn yielded(&self) -> &HashSet<B256> {
        &self.yielded
    }
}

#[async_trait]
impl<P: TxPool> CandidateSource for PoolSource<P> {
    fn is_replay(&self) -> bool {
        false
    }

    fn coinbase(&self) -> Option<Address> {
        None
    }

    fn next_block(&mut self) -> Option<BlockStart> {
        Some(BlockStart::live())
    }

    async fn next_candidates(&mut self) -> Result<Vec<Candidate>, SequencerError> {
        self.pool.lock_flusher();
        let result = self.pool.yield_best(self.yield_size, &self.yielded).await;
        self.pool.unlock_flusher();

        let txs = result.map_err(|e| SequencerError::Pool(e.to_string()))?;
        if !txs.is_empty() {
            debug!(count = txs.len(), "yielded transactions from pool");
        }

        let effective_gas_percentage = self.effective_gas_percentage;
        Ok(txs
            .into_iter()
            .map(|tx| {
                self.yielded.insert(tx.hash());
                Candidate {
                    tx,
                    effective_gas_percentage,
                }
            })
            .collect())
    }

    fn release(&mut self, hashes: &[B256]) {
        for hash in hashes {
            self.yielded.remove(hash);
        }
    }

    async fn commit(&mut self, hashes: &[B256]) -> Result<(), SequencerError> {
        if hashes.is_empty() {
            return Ok(());
        }
        self.pool
            .remove_mined(hashes)
            .await
            .map_err(|e| SequencerError::Pool(e.to_string()))
    }
}

/// Replays a batch from persisted L1 data.
#[derive(Debug)]
pub struct RecoverySource {
    blocks: VecDeque<DecodedBlock>,
    current: Option<DecodedBlock>,
    coinbase: Address,
}

impl RecoverySource {
    /// Loads the recovered data of `batch`. Returns `None` when there is
    /// nothing to replay.
    pub async fn load<R>(store: &R, batch: u64) -> Result<Option<Self>, SequencerError>
    where
        R: RecoveryStore + ?Sized,
    {
        let Some(recovered) = store.recovered_batch(batch).await? else {
            return Ok(None);
        };
        if recovered.blocks.is_empty() {
            if !recovered.work_remaining {
                warn!(batch, "no more batches to recover from L1 data");
            }
            return Ok(None);
        }
        Ok(Some(Self {
            blocks: recovered.blocks.into(),
            current: None,
            coinbase: recovered.coinbase,
        }))
    }

    /// Blocks not handed out yet.
    pub fn remaining_blocks(&self) -> usize {
        self.blocks.len()
    }
}

#[async_trait]
impl CandidateSource for RecoverySource {
    fn is_replay(&self) -> bool {
        true
    }

    fn coinbase(&self) -> Option<Address> {
        Some(self.coinbase)
    }

    fn next_block(&mut self) -> Option<BlockStart> {
        let block = self.blocks.pop_front()?;
        let start = BlockStart {
            delta_timestamp: Some(block.delta_timestamp),
            l1_info_tree_index: block.l1_info_tree_index,
        };
        self.current = Some(block);
        Some(start)
    }

    async fn next_candidates(&mut self) -> Result<Vec<Candidate>, SequencerError> {
        let Some(block) = self.current.take() else {
            return Ok(Vec::new());
        };
        let percentages = block.effective_gas_percentages;
        Ok(block
            .transactions
            .into_iter()
            .enumerate()
            .map(|(i, tx)| Candidate {
                tx,
                effective_gas_percentage: percentages
                    .get(i)
                    .copied()
                    .unwrap_or(FULL_EFFECTIVE_GAS_PERCENTAGE),
            })
            .collect())
    }

    fn release(&mut self, _hashes: &[B256]) {}

    async fn commit(&mut self, _hashes: &[B256]) -> Result<(), SequencerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use zkseq_common::{
        test_utils::{test_tx, InMemoryChainStore},
        MockTxPool, RecoveredBatch,
    };

    use super::*;

    #[tokio::test]
    async fn test_pool_source_excludes_yielded() {
        let mut pool = MockTxPool::new();
        pool.expect_lock_flusher().times(2).return_const(());
        pool.expect_unlock_flusher().times(2).return_const(());
        pool.expect_yield_best()
            .withf(|max, exclude| *max == 10 && exclude.is_empty())
            .times(1)
            .returning(|_, _| Ok(vec![test_tx(1), test_tx(2)]));
        pool.expect_yield_best()
            .withf(|_, exclude| exclude.len() == 1)
            .times(1)
            .returning(|_, _| Ok(vec![test_tx(2)]));

        let mut source = PoolSource::new(Arc::new(pool), 10, 200);
        let first = source.next_candidates().await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].effective_gas_percentage, 200);
        assert_eq!(source.yielded().len(), 2);

        source.release(&[test_tx(2).hash()]);
        let second = source.next_candidates().await.unwrap();
        assert_eq!(second[0].tx, test_tx(2));
    }

    #[tokio::test]
    async fn test_pool_source_unlocks_on_error() {
        let mut pool = MockTxPool::new();
        pool.expect_lock_flusher().times(1).return_const(());
        pool.expect_unlock_flusher().times(1).return_const(());
        pool.expect_yield_best()
            .returning(|_, _| Err(eyre::eyre!("pool closed")));

        let mut source = PoolSource::new(Arc::new(pool), 10, 255);
        let err = source.next_candidates().await.unwrap_err();
        assert!(matches!(err, SequencerError::Pool(_)));
    }

    #[tokio::test]
    async fn test_pool_source_commit_removes_mined() {
        let hash = test_tx(1).hash();
        let mut pool = MockTxPool::new();
        pool.expect_remove_mined()
            .withf(move |hashes| hashes == [hash])
            .times(1)
            .returning(|_| Ok(()));

        let mut source = PoolSource::new(Arc::new(pool), 10, 255);
        source.commit(&[]).await.unwrap();
        source.commit(&[hash]).await.unwrap();
    }

    #[tokio::test]
    async fn test_recovery_source_replays_blocks() {
        let store = InMemoryChainStore::new(B256::ZERO, 0);
        let data = RecoveredBatch {
            blocks: vec![
                DecodedBlock {
                    delta_timestamp: 3,
                    l1_info_tree_index: 0,
                    transactions: vec![test_tx(1), test_tx(2)],
                    effective_gas_percentages: vec![128],
                },
                DecodedBlock {
                    delta_timestamp: 5,
                    l1_info_tree_index: 7,
                    transactions: vec![],
                    effective_gas_percentages: vec![],
                },
            ],
            coinbase: Address::repeat_byte(0x33),
            work_remaining: true,
        };
        store.insert_recovered_batch(4, data);

        assert!(RecoverySource::load(&store, 5).await.unwrap().is_none());
        let mut source = RecoverySource::load(&store, 4).await.unwrap().unwrap();
        assert!(source.is_replay());
        assert_eq!(source.coinbase(), Some(Address::repeat_byte(0x33)));

        let start = source.next_block().unwrap();
        assert_eq!(start.delta_timestamp, Some(3));
        assert!(!start.verify_merkle_proof());
        let candidates = source.next_candidates().await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].effective_gas_percentage, 128);
        assert_eq!(candidates[1].effective_gas_percentage, 255);
        assert!(source.next_candidates().await.unwrap().is_empty());

        assert!(source.next_block().unwrap().verify_merkle_proof());
        assert_eq!(source.remaining_blocks(), 0);
        assert!(source.next_block().is_none());
    }
}
