use std::iter;

use crate::{
    collector::{calculate_smt_levels, CombinedCounters, CounterCollector},
    transaction::TransactionCounter,
};

/// Aggregated counters of a batch under construction.
///
/// Blocks are only accounted for as a count; their cost is materialized
/// each time the collectors are combined. Cloning snapshots the whole
/// batch, which is what a block rerun restores from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCounterCollector {
    transactions: Vec<TransactionCounter>,
    smt_levels: usize,
    fork_id: u64,
    block_count: usize,
}

impl BatchCounterCollector {
    pub fn new(smt_max_level: u32, fork_id: u64) -> Self {
        Self {
            transactions: Vec::new(),
            smt_levels: calculate_smt_levels(smt_max_level),
            fork_id,
            block_count: 0,
        }
    }

    pub fn smt_levels(&self) -> usize {
        self.smt_levels
    }

    pub fn fork_id(&self) -> u64 {
        self.fork_id
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Accounts for a new block and reports whether the batch now overflows.
    pub fn start_new_block(&mut self, verify_merkle_proof: bool) -> bool {
        self.block_count += 1;
        self.combine_collectors(verify_merkle_proof).is_overflow()
    }

    /// Adds a transaction's counters and reports whether the batch now
    /// overflows. The counters are kept either way; callers that reject the
    /// transaction restore from an earlier clone.
    pub fn add_new_transaction_counters(&mut self, counters: TransactionCounter) -> bool {
        self.transactions.push(counters);
        self.check_for_overflow()
    }

    /// Replaces the counters of the most recently added transaction, once its
    /// execution and processing costs are known.
    pub fn update_last_transaction(&mut self, counters: TransactionCounter) {
        match self.transactions.last_mut() {
            Some(last) => *last = counters,
            None => self.transactions.push(counters),
        }
    }

    /// Drops the most recently added transaction, e.g. after the executor
    /// rejected it.
    pub fn remove_last_transaction(&mut self) -> Option<TransactionCounter> {
        self.transactions.pop()
    }

    pub fn check_for_overflow(&self) -> bool {
        self.combine_collectors(false).is_overflow()
    }

    /// Combines the batch and every transaction collector into one ledger.
    pub fn combine_collectors(&self, verify_merkle_proof: bool) -> CombinedCounters {
        let mut batch = CounterCollector::new(self.smt_levels);
        for _ in 0..self.block_count {
            batch.decode_change_l2_block_tx();
            batch.process_change_l2_block(verify_merkle_proof);
        }
        batch.finish_batch_processing();

        let txs = self.transactions.iter().flat_map(TransactionCounter::collectors);
        CounterCollector::combine(iter::once(&batch).chain(txs))
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::*;
    use crate::{dimension::Dimension, transaction::CounterTransaction};

    struct BigTx(usize);

    impl CounterTransaction for BigTx {
        fn encoded_len(&self) -> usize {
            self.0 + 100
        }

        fn data_len(&self) -> usize {
            self.0
        }

        fn nonce(&self) -> u64 {
            1
        }

        fn gas_price(&self) -> U256 {
            U256::from(1u8)
        }

        fn gas_limit(&self) -> u64 {
            30_000_000
        }

        fn value(&self) -> U256 {
            U256::ZERO
        }

        fn chain_id(&self) -> u64 {
            1
        }

        fn signature(&self) -> (U256, U256, U256) {
            (U256::from(27u8), U256::from(1u8), U256::from(1u8))
        }

        fn is_protected(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_empty_batch_charges_finish_only() {
        let batch = BatchCounterCollector::new(64, 9);
        assert_eq!(batch.smt_levels(), 66);
        let combined = batch.combine_collectors(false);
        assert!(!combined.is_overflow());
        assert_eq!(combined.counters[Dimension::Steps].used(), 200);
        assert_eq!(combined.counters[Dimension::Keccak].used(), 2);
    }

    #[test]
    fn test_blocks_add_cost() {
        let mut batch = BatchCounterCollector::new(0, 9);
        let before = batch.combine_collectors(false).counters[Dimension::Steps].used();
        assert!(!batch.start_new_block(false));
        let after = batch.combine_collectors(false).counters[Dimension::Steps].used();
        assert!(after > before);
        assert_eq!(batch.block_count(), 1);
    }

    #[test]
    fn test_clone_restores_batch() {
        let mut batch = BatchCounterCollector::new(0, 9);
        batch.start_new_block(false);
        let snapshot = batch.clone();

        assert!(!batch.add_new_transaction_counters(TransactionCounter::new(&BigTx(100), 32)));
        assert_eq!(batch.transaction_count(), 1);
        assert_eq!(snapshot.transaction_count(), 0);
        assert_ne!(snapshot.combine_collectors(false), batch.combine_collectors(false));

        assert!(batch.remove_last_transaction().is_some());
        assert_eq!(snapshot, batch);
    }

    #[test]
    fn test_large_call_data_overflows() {
        let mut batch = BatchCounterCollector::new(0, 9);
        batch.start_new_block(false);
        // byte-by-byte hashing charges binary for every byte
        let overflowed = batch.add_new_transaction_counters(TransactionCounter::new(&BigTx(200_000), 32));
        assert!(overflowed);
        assert!(batch.combine_collectors(false).overflow.is_some());
    }
}
