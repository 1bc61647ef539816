use alloy_primitives::B256;
use zkseq_counters::CounterCollector;

use crate::{BlockHeader, ExecutionError, L2Transaction};

/// Result of applying one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub gas_used: u64,
    /// Whether the transaction deployed a contract.
    pub is_deploy: bool,
    /// Returned init code length for deployments, callee code length
    /// otherwise.
    pub bytecode_len: usize,
}

/// EVM executing transactions of one block at a time.
///
/// Opening a block discards whatever block was open before, which is how a
/// block assembly restarts after an overflow.
pub trait BlockExecutor: Send {
    fn begin_block(&mut self, header: &BlockHeader, parent_root: B256)
        -> Result<(), ExecutionError>;

    /// Applies `tx` to the open block, charging the micro-operations it runs
    /// to `counters`.
    fn execute_transaction(
        &mut self,
        tx: &L2Transaction,
        effective_gas_percentage: u8,
        counters: &mut CounterCollector,
    ) -> Result<ExecutionOutcome, ExecutionError>;

    /// Closes the open block and returns its state root.
    fn finish_block(&mut self) -> Result<B256, ExecutionError>;
}
