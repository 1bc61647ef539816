use std::{collections::HashSet, sync::Arc};

use alloy_primitives::{keccak256, B256};
use parking_lot::Mutex;
use zkseq_counters::{CounterCollector, Dimension};

use crate::{BlockExecutor, BlockHeader, ExecutionError, ExecutionOutcome, L2Transaction};

/// Executor that folds transaction hashes into the state root and charges a
/// configurable number of steps per transaction.
#[derive(Debug, Default)]
pub struct TestBlockExecutor {
    open_root: Option<B256>,
    steps_per_tx: usize,
    rejected: HashSet<B256>,
    log: Arc<Mutex<Vec<B256>>>,
}

impl TestBlockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_steps_per_tx(mut self, steps: usize) -> Self {
        self.steps_per_tx = steps;
        self
    }

    /// Makes execution of `hash` fail as an invalid transaction.
    pub fn with_rejected(mut self, hash: B256) -> Self {
        self.rejected.insert(hash);
        self
    }

    /// Hashes of every transaction executed, in order, across all blocks.
    pub fn execution_log(&self) -> Arc<Mutex<Vec<B256>>> {
        self.log.clone()
    }
}

impl BlockExecutor for TestBlockExecutor {
    fn begin_block(
        &mut self,
        _header: &BlockHeader,
        parent_root: B256,
    ) -> Result<(), ExecutionError> {
        self.open_root = Some(parent_root);
        Ok(())
    }

    fn execute_transaction(
        &mut self,
        tx: &L2Transaction,
        _effective_gas_percentage: u8,
        counters: &mut CounterCollector,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let root = self.open_root.as_mut().ok_or(ExecutionError::NoOpenBlock)?;
        let hash = tx.hash();
        if self.rejected.contains(&hash) {
            return Err(ExecutionError::invalid_transaction(hash, "rejected by test executor"));
        }

        counters.op_code(tx.is_deploy());
        counters.deduct(Dimension::Steps, self.steps_per_tx);

        let mut buf = root.to_vec();
        buf.extend_from_slice(hash.as_slice());
        *root = keccak256(buf);
        self.log.lock().push(hash);

        Ok(ExecutionOutcome {
            success: true,
            gas_used: 21_000,
            is_deploy: tx.is_deploy(),
            bytecode_len: if tx.is_deploy() { tx.input.len() } else { 0 },
        })
    }

    fn finish_block(&mut self) -> Result<B256, ExecutionError> {
        self.open_root.take().ok_or(ExecutionError::NoOpenBlock)
    }
}
