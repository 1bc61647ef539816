//! Application of verification results to the chain.

use std::{fmt, sync::Arc};

use tracing::{debug, info, warn};
use zkseq_common::{
    ChainStore, DataStreamEncoder, DataStreamPublisher, Stage, UnwindReason, Unwinder,
};
use zkseq_verifier::{BatchDispatcher, BatchVerifier, VerifierBundle};

use crate::error::SequencerError;

/// What a [`RollbackCoordinator::apply`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// No verification completed at the head of the queue.
    Idle { remaining: usize },
    /// Batches up to `batch` were confirmed and published.
    Confirmed { batch: u64, remaining: usize },
    /// `batch` failed verification and the chain was unwound to `unwind_to`.
    /// Batches confirmed earlier in the same call stay confirmed.
    RolledBack { batch: u64, unwind_to: u64 },
}

/// Confirms verified batches in order and unwinds the chain on the first
/// rejected one.
pub struct RollbackCoordinator<S, U, E, P> {
    store: Arc<S>,
    unwinder: Arc<U>,
    encoder: Arc<E>,
    publisher: Arc<P>,
    last_published_batch: u64,
}

impl<S, U, E, P> fmt::Debug for RollbackCoordinator<S, U, E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollbackCoordinator")
            .field("last_published_batch", &self.last_published_batch)
            .finish_non_exhaustive()
    }
}

impl<S, U, E, P> RollbackCoordinator<S, U, E, P>
where
    S: ChainStore,
    U: Unwinder,
    E: DataStreamEncoder,
    P: DataStreamPublisher,
{
    /// Resumes from the persisted confirmation checkpoint.
    pub async fn new(
        store: Arc<S>,
        unwinder: Arc<U>,
        encoder: Arc<E>,
        publisher: Arc<P>,
    ) -> Result<Self, SequencerError> {
        let last_published_batch = store.stage_progress(Stage::SequenceExecutorVerify).await?;
        Ok(Self {
            store,
            unwinder,
            encoder,
            publisher,
            last_published_batch,
        })
    }

    /// Highest batch confirmed so far.
    pub fn last_published_batch(&self) -> u64 {
        self.last_published_batch
    }

    /// Drains completed verifications from `verifier` and applies them.
    pub async fn apply<D: BatchDispatcher>(
        &mut self,
        verifier: &BatchVerifier<D>,
    ) -> Result<RollbackOutcome, SequencerError> {
        let progress = verifier.check_progress()?;
        let mut confirmed = None;

        for bundle in progress.bundles {
            if !bundle.is_valid() {
                let batch = bundle.request.batch_number;
                let unwind_to = self.roll_back(&bundle).await?;
                verifier.cancel_all().await;
                return Ok(RollbackOutcome::RolledBack { batch, unwind_to });
            }
            self.confirm(&bundle).await?;
            confirmed = Some(bundle.request.batch_number);
        }

        Ok(match confirmed {
            Some(batch) => RollbackOutcome::Confirmed {
                batch,
                remaining: progress.remaining,
            },
            None => RollbackOutcome::Idle {
                remaining: progress.remaining,
            },
        })
    }

    /// Publishes the blocks of a verified batch and advances the checkpoint.
    async fn confirm(&mut self, bundle: &VerifierBundle) -> Result<(), SequencerError> {
        let batch = bundle.request.batch_number;
        if batch <= self.last_published_batch {
            debug!(batch, "batch already confirmed");
            return Ok(());
        }

        let mut previous_batch = self.last_published_batch;
        for &number in &bundle.block_numbers {
            let block = self
                .store
                .block_by_number(number)
                .await?
                .ok_or(SequencerError::MissingBlock(number))?;
            let entries = self
                .encoder
                .encode(&block, batch, previous_batch)
                .map_err(|e| SequencerError::Stream(e.to_string()))?;
            self.publisher
                .publish(number, entries)
                .await
                .map_err(|e| SequencerError::Stream(e.to_string()))?;
            previous_batch = batch;
        }

        self.store
            .save_stage_progress(Stage::SequenceExecutorVerify, batch)
            .await?;
        self.last_published_batch = batch;
        info!(
            batch,
            blocks = bundle.block_numbers.len(),
            check_count = bundle.request.check_count,
            "batch verified"
        );
        Ok(())
    }

    /// Unwinds the chain to the parent of the first block of the rejected
    /// batch and returns the new tip.
    async fn roll_back(&mut self, bundle: &VerifierBundle) -> Result<u64, SequencerError> {
        let batch = bundle.request.batch_number;
        let first_block = bundle.first_block().unwrap_or(bundle.request.block_number);
        let unwind_to = first_block.saturating_sub(1);
        let bad_block = self
            .store
            .header_by_number(first_block)
            .await?
            .ok_or(SequencerError::MissingBlock(first_block))?
            .hash();

        warn!(
            batch,
            block = first_block,
            unwind_to,
            error = bundle.response.error.as_deref().unwrap_or("rejected"),
            "batch failed verification, unwinding"
        );

        // Marker and pinned fork have to be persisted before the unwind.
        self.store.write_just_unwound(batch).await?;
        self.store
            .write_fork_id(batch, bundle.request.fork_id)
            .await?;
        self.unwinder
            .unwind_to(unwind_to, bad_block, UnwindReason::VerificationFailed { batch })
            .await?;

        Ok(unwind_to)
    }
}
