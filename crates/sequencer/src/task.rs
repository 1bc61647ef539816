//! Sequencer task implementation.

use tokio::time::sleep;
use tracing::{error, info, warn};
use zkseq_common::{
    BlockExecutor, ChainStore, DataStreamEncoder, DataStreamPublisher, RecoveryStore, TxPool,
    Unwinder,
};
use zkseq_verifier::BatchDispatcher;

use crate::{clock::Clock, ctx::SequencerCtx, error::SequencerError, rollback::RollbackOutcome};

/// Main sequencer task.
///
/// Alternates between building a batch and applying the verification
/// results that completed meanwhile. Non-fatal failures are retried after
/// one poll interval; a fatal one halts the task until an operator restarts
/// it.
pub(crate) async fn sequencer_task<S, X, P, D, C, U, E, B>(
    mut ctx: SequencerCtx<S, X, P, D, C, U, E, B>,
) where
    S: ChainStore + RecoveryStore,
    X: BlockExecutor,
    P: TxPool,
    D: BatchDispatcher,
    C: Clock,
    U: Unwinder,
    E: DataStreamEncoder,
    B: DataStreamPublisher,
{
    info!("sequencer started");

    while !ctx.signals.is_shutdown() {
        match process_cycle(&mut ctx).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => {
                error!(error = %e, "sequencer halted, operator intervention required");
                ctx.halted_tx.send_replace(Some(e.to_string()));
                return;
            }
            Err(e) => {
                warn!(error = %e, "sequencing cycle failed");
                idle(&mut ctx).await;
            }
        }
    }

    info!("waiting for outstanding verifications");
    ctx.sequencer.verifier().wait_for_finish().await;
    if let Err(e) = apply_verifications(&mut ctx).await {
        error!(error = %e, "failed to apply final verification results");
    }
    info!(confirmed = ctx.rollback.last_published_batch(), "sequencer stopped");
}

/// Process one cycle of the sequencer.
pub(crate) async fn process_cycle<S, X, P, D, C, U, E, B>(
    ctx: &mut SequencerCtx<S, X, P, D, C, U, E, B>,
) -> Result<(), SequencerError>
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
    if apply_verifications(ctx).await? {
        return Ok(());
    }

    match ctx.sequencer.sequence_batch(&mut ctx.signals).await? {
        Some(sealed) => {
            ctx.sealed_tx.send_replace(Some(sealed));
        }
        None => idle(ctx).await,
    }

    apply_verifications(ctx).await?;
    Ok(())
}

/// Applies completed verifications. Returns whether the chain was rolled
/// back.
async fn apply_verifications<S, X, P, D, C, U, E, B>(
    ctx: &mut SequencerCtx<S, X, P, D, C, U, E, B>,
) -> Result<bool, SequencerError>
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
    let outcome = ctx.rollback.apply(ctx.sequencer.verifier()).await;
    ctx.confirmed_tx
        .send_replace(ctx.rollback.last_published_batch());

    match outcome? {
        RollbackOutcome::Idle { .. } | RollbackOutcome::Confirmed { .. } => Ok(false),
        RollbackOutcome::RolledBack { batch, unwind_to } => {
            warn!(batch, unwind_to, "rolled back unverified batch");
            ctx.rolled_back_tx.send_replace(Some(batch));
            Ok(true)
        }
    }
}

/// Waits one poll interval or until shutdown.
async fn idle<S, X, P, D, C, U, E, B>(ctx: &mut SequencerCtx<S, X, P, D, C, U, E, B>) {
    let wait = ctx.sequencer.config().pool_poll_interval();
    tokio::select! {
        _ = sleep(wait) => {}
        _ = ctx.signals.shutdown.changed() => {}
    }
}
