//! Context for the sequencer task.

use tokio::sync::watch;

use crate::{
    batch::{BatchSequencer, BatchSignals, SealedBatch},
    rollback::RollbackCoordinator,
};

/// Everything the sequencer task owns.
pub(crate) struct SequencerCtx<S, X, P, D, C, U, E, B> {
    /// Builds batches and queues them for verification.
    pub sequencer: BatchSequencer<S, X, P, D, C>,
    /// Applies verification results in batch order.
    pub rollback: RollbackCoordinator<S, U, E, B>,
    /// Shutdown and seal requests from the handle.
    pub signals: BatchSignals,
    /// Latest batch closed by the sequencer.
    pub sealed_tx: watch::Sender<Option<SealedBatch>>,
    /// Highest batch confirmed by verification.
    pub confirmed_tx: watch::Sender<u64>,
    /// Latest batch that failed verification and was rolled back.
    pub rolled_back_tx: watch::Sender<Option<u64>>,
    /// Set once the task stopped on a fatal error.
    pub halted_tx: watch::Sender<Option<String>>,
}
