use std::{
    collections::HashSet,
    sync::atomic::{AtomicUsize, Ordering},
};

use alloy_primitives::B256;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{L2Transaction, TxPool};

/// Pool handing out transactions in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryTxPool {
    pending: Mutex<Vec<L2Transaction>>,
    mined: Mutex<Vec<B256>>,
    flusher_locks: AtomicUsize,
}

impl InMemoryTxPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transactions(txs: impl IntoIterator<Item = L2Transaction>) -> Self {
        let pool = Self::new();
        pool.pending.lock().extend(txs);
        pool
    }

    pub fn add(&self, tx: L2Transaction) {
        self.pending.lock().push(tx);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Hashes removed as mined, in order.
    pub fn mined(&self) -> Vec<B256> {
        self.mined.lock().clone()
    }

    /// Number of flusher locks not yet released.
    pub fn held_flusher_locks(&self) -> usize {
        self.flusher_locks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TxPool for InMemoryTxPool {
    fn lock_flusher(&self) {
        self.flusher_locks.fetch_add(1, Ordering::SeqCst);
    }

    fn unlock_flusher(&self) {
        self.flusher_locks.fetch_sub(1, Ordering::SeqCst);
    }

    async fn yield_best(
        &self,
        max: usize,
        exclude: &HashSet<B256>,
    ) -> eyre::Result<Vec<L2Transaction>> {
        Ok(self
            .pending
            .lock()
            .iter()
            .filter(|tx| !exclude.contains(&tx.hash()))
            .take(max)
            .cloned()
            .collect())
    }

    async fn remove_mined(&self, hashes: &[B256]) -> eyre::Result<()> {
        self.pending.lock().retain(|tx| !hashes.contains(&tx.hash()));
        self.mined.lock().extend_from_slice(hashes);
        Ok(())
    }
}
