use std::collections::BTreeMap;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    BlockHeader, ChainStore, ChainView, ForkActivation, L2Block, RecoveredBatch, RecoveryStore,
    Stage, StorageError, UnwindReason, Unwinder,
};

#[derive(Debug, Clone, Default)]
struct ChainState {
    blocks: BTreeMap<u64, L2Block>,
    block_batches: BTreeMap<u64, u64>,
    stages: BTreeMap<Stage, u64>,
    batch_counters: BTreeMap<u64, BTreeMap<String, i64>>,
    fork_history: Vec<ForkActivation>,
    fork_ids: BTreeMap<u64, u64>,
    fork_blocks: BTreeMap<u64, u64>,
    just_unwound: Option<u64>,
    recovered: BTreeMap<u64, RecoveredBatch>,
    unwinds: Vec<(u64, B256, UnwindReason)>,
}

impl ChainState {
    fn tip(&self) -> u64 {
        self.blocks.keys().next_back().copied().unwrap_or_default()
    }
}

/// Snapshot of an [`InMemoryChainStore`].
#[derive(Debug, Clone)]
pub struct InMemoryChainView(ChainState);

impl ChainView for InMemoryChainView {
    fn header_by_number(&self, number: u64) -> Result<Option<BlockHeader>, StorageError> {
        Ok(self.0.blocks.get(&number).map(|b| b.header.clone()))
    }

    fn block_by_number(&self, number: u64) -> Result<Option<L2Block>, StorageError> {
        Ok(self.0.blocks.get(&number).cloned())
    }

    fn batch_of_block(&self, number: u64) -> Result<Option<u64>, StorageError> {
        Ok(self.0.block_batches.get(&number).copied())
    }

    fn highest_block(&self) -> Result<u64, StorageError> {
        Ok(self.0.tip())
    }
}

/// Chain store kept entirely in memory, starting from a genesis block in
/// batch 0.
#[derive(Debug)]
pub struct InMemoryChainStore {
    state: RwLock<ChainState>,
}

impl InMemoryChainStore {
    pub fn new(genesis_root: B256, genesis_timestamp: u64) -> Self {
        let genesis = L2Block {
            header: BlockHeader {
                number: 0,
                parent_hash: B256::ZERO,
                coinbase: Address::ZERO,
                timestamp: genesis_timestamp,
                gas_limit: u64::MAX,
                state_root: genesis_root,
            },
            transactions: Vec::new(),
            receipts: Vec::new(),
            effective_gas_percentages: Vec::new(),
        };
        let mut state = ChainState::default();
        state.blocks.insert(0, genesis);
        state.block_batches.insert(0, 0);
        Self {
            state: RwLock::new(state),
        }
    }

    /// Registers a fork activated for batches after `batch`.
    pub fn with_fork(self, fork_id: u64, batch: u64) -> Self {
        {
            let mut state = self.state.write();
            state.fork_history.push(ForkActivation { fork_id, batch });
            state.fork_history.sort_by_key(|f| f.batch);
        }
        self
    }

    pub fn insert_recovered_batch(&self, batch: u64, data: RecoveredBatch) {
        self.state.write().recovered.insert(batch, data);
    }

    /// Unwinds issued against this store, in order.
    pub fn unwinds(&self) -> Vec<(u64, B256, UnwindReason)> {
        self.state.read().unwinds.clone()
    }

    pub fn tip(&self) -> u64 {
        self.state.read().tip()
    }
}

#[async_trait]
impl ChainStore for InMemoryChainStore {
    type View = InMemoryChainView;

    fn view(&self) -> Result<Self::View, StorageError> {
        Ok(InMemoryChainView(self.state.read().clone()))
    }

    async fn header_by_number(&self, number: u64) -> Result<Option<BlockHeader>, StorageError> {
        Ok(self.state.read().blocks.get(&number).map(|b| b.header.clone()))
    }

    async fn block_by_number(&self, number: u64) -> Result<Option<L2Block>, StorageError> {
        Ok(self.state.read().blocks.get(&number).cloned())
    }

    async fn append_block(&self, block: L2Block, batch: u64) -> Result<(), StorageError> {
        let mut state = self.state.write();
        let tip = state.tip();
        if block.number() != tip + 1 {
            return Err(StorageError::NonContiguousBlock {
                attempted: block.number(),
                tip,
            });
        }
        state.block_batches.insert(block.number(), batch);
        state.blocks.insert(block.number(), block);
        Ok(())
    }

    async fn blocks_in_batch(&self, batch: u64) -> Result<Vec<u64>, StorageError> {
        Ok(self
            .state
            .read()
            .block_batches
            .iter()
            .filter(|(_, b)| **b == batch)
            .map(|(n, _)| *n)
            .collect())
    }

    async fn stage_progress(&self, stage: Stage) -> Result<u64, StorageError> {
        Ok(self
            .state
            .read()
            .stages
            .get(&stage)
            .copied()
            .unwrap_or_default())
    }

    async fn save_stage_progress(&self, stage: Stage, value: u64) -> Result<(), StorageError> {
        self.state.write().stages.insert(stage, value);
        Ok(())
    }

    async fn write_batch_counters(
        &self,
        batch: u64,
        counters: BTreeMap<String, i64>,
    ) -> Result<(), StorageError> {
        self.state.write().batch_counters.insert(batch, counters);
        Ok(())
    }

    async fn batch_counters(
        &self,
        batch: u64,
    ) -> Result<Option<BTreeMap<String, i64>>, StorageError> {
        Ok(self.state.read().batch_counters.get(&batch).cloned())
    }

    async fn fork_history(&self) -> Result<Vec<ForkActivation>, StorageError> {
        Ok(self.state.read().fork_history.clone())
    }

    async fn fork_id(&self, batch: u64) -> Result<Option<u64>, StorageError> {
        Ok(self.state.read().fork_ids.get(&batch).copied())
    }

    async fn write_fork_id(&self, batch: u64, fork_id: u64) -> Result<(), StorageError> {
        self.state.write().fork_ids.insert(batch, fork_id);
        Ok(())
    }

    async fn write_fork_block_once(&self, fork_id: u64, block: u64) -> Result<(), StorageError> {
        self.state.write().fork_blocks.entry(fork_id).or_insert(block);
        Ok(())
    }

    async fn fork_block(&self, fork_id: u64) -> Result<Option<u64>, StorageError> {
        Ok(self.state.read().fork_blocks.get(&fork_id).copied())
    }

    async fn write_just_unwound(&self, batch: u64) -> Result<(), StorageError> {
        self.state.write().just_unwound = Some(batch);
        Ok(())
    }

    async fn just_unwound(&self) -> Result<Option<u64>, StorageError> {
        Ok(self.state.read().just_unwound)
    }
}

#[async_trait]
impl RecoveryStore for InMemoryChainStore {
    async fn recovered_batch(&self, batch: u64) -> Result<Option<RecoveredBatch>, StorageError> {
        Ok(self.state.read().recovered.get(&batch).cloned())
    }
}

#[async_trait]
impl Unwinder for InMemoryChainStore {
    async fn unwind_to(
        &self,
        target: u64,
        bad_block: B256,
        reason: UnwindReason,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write();
        if !state.blocks.contains_key(&target) {
            return Err(StorageError::BlockNotFound(target));
        }
        state.blocks.retain(|n, _| *n <= target);
        state.block_batches.retain(|n, _| *n <= target);

        let target_batch = state.block_batches.get(&target).copied().unwrap_or_default();
        state.batch_counters.retain(|b, _| *b <= target_batch);
        state.stages.insert(Stage::Execution, target);
        state.stages.insert(Stage::HighestSeenBatchNumber, target_batch);
        let verified = state
            .stages
            .get(&Stage::SequenceExecutorVerify)
            .copied()
            .unwrap_or_default();
        state
            .stages
            .insert(Stage::SequenceExecutorVerify, verified.min(target_batch));
        state.unwinds.push((target, bad_block, reason));
        Ok(())
    }
}
