//! Builder and handle for the sequencer task.

use std::{future::Future, sync::Arc};

use tokio::sync::{watch, Notify};
use zkseq_common::{
    BlockExecutor, ChainStore, DataStreamEncoder, DataStreamPublisher, RecoveryStore, TxPool,
    Unwinder,
};
use zkseq_verifier::BatchDispatcher;

use crate::{
    batch::{BatchSequencer, BatchSignals, SealedBatch},
    clock::Clock,
    ctx::SequencerCtx,
    rollback::RollbackCoordinator,
    task::sequencer_task,
};

/// Handle to observe and steer the sequencer task.
#[derive(Debug, Clone)]
pub struct SequencerHandle {
    sealed_rx: watch::Receiver<Option<SealedBatch>>,
    confirmed_rx: watch::Receiver<u64>,
    rolled_back_rx: watch::Receiver<Option<u64>>,
    halted_rx: watch::Receiver<Option<String>>,
    seal: Arc<Notify>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl SequencerHandle {
    pub fn sealed_batch_watcher(&self) -> watch::Receiver<Option<SealedBatch>> {
        self.sealed_rx.clone()
    }

    /// Latest batch closed by the sequencer, if any.
    pub fn latest_sealed_batch(&self) -> Option<SealedBatch> {
        self.sealed_rx.borrow().clone()
    }

    pub fn confirmed_batch_watcher(&self) -> watch::Receiver<u64> {
        self.confirmed_rx.clone()
    }

    /// Highest batch confirmed by verification.
    pub fn confirmed_batch(&self) -> u64 {
        *self.confirmed_rx.borrow()
    }

    pub fn rolled_back_watcher(&self) -> watch::Receiver<Option<u64>> {
        self.rolled_back_rx.clone()
    }

    pub fn halted_watcher(&self) -> watch::Receiver<Option<String>> {
        self.halted_rx.clone()
    }

    /// Error the task halted on, if it did.
    pub fn halt_reason(&self) -> Option<String> {
        self.halted_rx.borrow().clone()
    }

    /// Closes the open batch once its current block is finished.
    pub fn request_seal(&self) {
        self.seal.notify_one();
    }

    /// Stops the task. The open block is abandoned and outstanding
    /// verifications are awaited before the task exits.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }
}

/// Create sequencer task.
pub fn create_sequencer<S, X, P, D, C, U, E, B>(
    sequencer: BatchSequencer<S, X, P, D, C>,
    rollback: RollbackCoordinator<S, U, E, B>,
) -> (SequencerHandle, impl Future<Output = ()>)
where
    S: ChainStore + RecoveryStore,
    X: BlockExecutor,
    P: TxPool,
    D: BatchDispatcher,
    C: Clock,
    U: Unwinder,
    E: DataStreamEncoder,
    B: DataStreamPublisher,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (sealed_tx, sealed_rx) = watch::channel(None);
    let (confirmed_tx, confirmed_rx) = watch::channel(rollback.last_published_batch());
    let (rolled_back_tx, rolled_back_rx) = watch::channel(None);
    let (halted_tx, halted_rx) = watch::channel(None);
    let seal = Arc::new(Notify::new());

    let ctx = SequencerCtx {
        sequencer,
        rollback,
        signals: BatchSignals {
            shutdown: shutdown_rx,
            seal: seal.clone(),
        },
        sealed_tx,
        confirmed_tx,
        rolled_back_tx,
        halted_tx,
    };

    let handle = SequencerHandle {
        sealed_rx,
        confirmed_rx,
        rolled_back_rx,
        halted_rx,
        seal,
        shutdown_tx: Arc::new(shutdown_tx),
    };
    let task = sequencer_task(ctx);

    (handle, task)
}
