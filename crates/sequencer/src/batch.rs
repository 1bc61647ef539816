//! Construction of one batch, block by block.

use std::{collections::BTreeMap, fmt, pin::Pin, sync::Arc};

use tokio::{
    sync::{watch, Notify},
    time::{interval, interval_at, sleep, Instant, MissedTickBehavior, Sleep},
};
use tracing::{debug, info, warn};
use zkseq_common::{
    BlockExecutor, BlockHeader, ChainStore, L2Block, Receipt, RecoveryStore, Stage, TxPool, B256,
};
use zkseq_config::SequencerConfig;
use zkseq_counters::BatchCounterCollector;
use zkseq_verifier::{BatchDispatcher, BatchVerifier};

use crate::{
    block::{attempt_add_transaction, TxAttempt},
    clock::Clock,
    data_checker::BlockDataChecker,
    error::SequencerError,
    fork::{prepare_fork_id, prepare_header},
    source::{BlockStart, Candidate, CandidateSource, PoolSource, RecoverySource},
};

/// A closed batch handed to verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBatch {
    pub batch_number: u64,
    pub fork_id: u64,
    /// Blocks of the batch, ascending.
    pub blocks: Vec<u64>,
    /// State root after the last block.
    pub state_root: B256,
    pub counters: BTreeMap<String, i64>,
}

impl SealedBatch {
    pub fn last_block(&self) -> Option<u64> {
        self.blocks.last().copied()
    }
}

/// External events that end a batch early.
#[derive(Debug, Clone)]
pub struct BatchSignals {
    pub shutdown: watch::Receiver<bool>,
    /// Notified to close the open batch after the current block.
    pub seal: Arc<Notify>,
}

impl BatchSignals {
    /// Whether shutdown was requested or the requesting side is gone.
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow() || self.shutdown.has_changed().is_err()
    }
}

/// Why the transaction wait of a block ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockEnd {
    /// The block timer fired or the replayed block was exhausted.
    Sealed,
    /// The batch has to be closed after this block.
    CloseBatch,
    /// A transaction overflowed, the block is rerun from its snapshot.
    Overflow,
    Shutdown,
}

/// State of a block captured when it was started.
struct OpenBlock {
    start: BlockStart,
    header: BlockHeader,
    parent_root: B256,
    counters: BatchCounterCollector,
    data_checker: BlockDataChecker,
}

/// Builds batches from a candidate source and queues them for verification.
pub struct BatchSequencer<S, X, P, D, C> {
    config: SequencerConfig,
    store: Arc<S>,
    executor: X,
    pool: Arc<P>,
    verifier: Arc<BatchVerifier<D>>,
    clock: C,
}

impl<S, X, P, D, C> fmt::Debug for BatchSequencer<S, X, P, D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchSequencer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S, X, P, D, C> BatchSequencer<S, X, P, D, C> {
    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn verifier(&self) -> &Arc<BatchVerifier<D>> {
        &self.verifier
    }
}

impl<S, X, P, D, C> BatchSequencer<S, X, P, D, C>
where
    S: ChainStore + RecoveryStore,
    X: BlockExecutor,
    P: TxPool,
    D: BatchDispatcher,
    C: Clock,
{
    pub fn new(
        config: SequencerConfig,
        store: Arc<S>,
        executor: X,
        pool: Arc<P>,
        verifier: Arc<BatchVerifier<D>>,
        clock: C,
    ) -> Self {
        Self {
            config,
            store,
            executor,
            pool,
            verifier,
            clock,
        }
    }

    /// Sequences the next batch.
    ///
    /// Returns `None` if no block was produced, either because recovery has
    /// nothing to replay or because shutdown was requested.
    pub async fn sequence_batch(
        &mut self,
        signals: &mut BatchSignals,
    ) -> Result<Option<SealedBatch>, SequencerError> {
        if signals.is_shutdown() {
            return Ok(None);
        }

        let execution_at = self.store.stage_progress(Stage::Execution).await?;
        let last_batch = self.store.stage_progress(Stage::HighestSeenBatchNumber).await?;
        let fork_id = prepare_fork_id(self.store.as_ref(), last_batch, execution_at).await?;
        let batch = last_batch + 1;

        if self.config.l1_recovery {
            match RecoverySource::load(self.store.as_ref(), batch).await? {
                Some(mut source) => {
                    self.build_batch(&mut source, signals, batch, fork_id, execution_at)
                        .await
                }
                None => Ok(None),
            }
        } else {
            let mut source = PoolSource::new(
                self.pool.clone(),
                self.config.yield_size,
                self.config.effective_gas_percentage,
            );
            self.build_batch(&mut source, signals, batch, fork_id, execution_at)
                .await
        }
    }

    async fn build_batch<Src: CandidateSource>(
        &mut self,
        source: &mut Src,
        signals: &mut BatchSignals,
        batch: u64,
        fork_id: u64,
        execution_at: u64,
    ) -> Result<Option<SealedBatch>, SequencerError> {
        if self.store.just_unwound().await? == Some(batch) {
            info!(batch, "re-sequencing batch after verification rollback");
        }
        info!(batch, fork_id, "starting batch");

        let coinbase = source.coinbase().unwrap_or(self.config.coinbase);
        let mut counters = BatchCounterCollector::new(self.config.smt_max_level, fork_id);
        let mut data_checker = BlockDataChecker::new(self.config.max_batch_l2_data_bytes);

        let batch_deadline = sleep(self.config.batch_seal_time());
        tokio::pin!(batch_deadline);

        let mut blocks = Vec::new();
        let mut state_root = B256::ZERO;
        let mut verify_merkle_proof = false;
        let mut parent_number = execution_at;
        let mut open: Option<OpenBlock> = None;
        let mut added: Vec<Candidate> = Vec::new();

        loop {
            let rerun = open.is_some();
            let block = match open.take() {
                Some(block) => {
                    counters = block.counters.clone();
                    data_checker = block.data_checker;
                    block
                }
                None => {
                    let Some(start) = source.next_block() else {
                        break;
                    };
                    added.clear();
                    let (header, parent_root) = prepare_header(
                        self.store.as_ref(),
                        &self.clock,
                        parent_number,
                        start.delta_timestamp,
                        fork_id,
                        coinbase,
                    )
                    .await?;
                    OpenBlock {
                        start,
                        header,
                        parent_root,
                        counters: counters.clone(),
                        data_checker,
                    }
                }
            };
            let number = block.header.number;
            info!(batch, block = number, rerun, "starting block");

            let start_overflow = counters.start_new_block(block.start.verify_merkle_proof())
                | data_checker.add_block_start_data();
            if start_overflow && !source.is_replay() && !blocks.is_empty() {
                info!(batch, block = number, "no room for another block, closing batch");
                counters = block.counters;
                break;
            }

            self.executor.begin_block(&block.header, block.parent_root)?;

            let mut receipts = Vec::with_capacity(added.len());
            let end = if rerun {
                self.replay_block(number, &added, &mut counters, &mut data_checker, &mut receipts)?;
                BlockEnd::CloseBatch
            } else {
                self.fill_block(
                    source,
                    signals,
                    &mut batch_deadline,
                    batch,
                    &block,
                    &mut counters,
                    &mut data_checker,
                    &mut added,
                    &mut receipts,
                )
                .await?
            };

            match end {
                BlockEnd::Shutdown => {
                    info!(batch, block = number, "shutdown requested, abandoning open block");
                    return Ok(None);
                }
                BlockEnd::Overflow => {
                    open = Some(block);
                    continue;
                }
                BlockEnd::Sealed | BlockEnd::CloseBatch => {}
            }

            state_root = self
                .finish_block(source, block.header, batch, &added, receipts)
                .await?;
            verify_merkle_proof = block.start.verify_merkle_proof();
            blocks.push(number);
            parent_number = number;

            if end == BlockEnd::CloseBatch {
                break;
            }
        }

        let Some(&last_block) = blocks.last() else {
            debug!(batch, "no blocks produced");
            return Ok(None);
        };

        let combined = counters.combine_collectors(verify_merkle_proof);
        let used = combined.counters.used_map();
        info!(
            batch,
            counters = %combined.counters,
            steps_pct = combined.steps_percentage(),
            "counters consumed"
        );
        self.store.write_batch_counters(batch, used.clone()).await?;
        self.store.write_fork_id(batch, fork_id).await?;

        self.verifier
            .add_new_check(batch, last_block, fork_id, state_root, used.clone(), blocks.clone());
        info!(batch, blocks = blocks.len(), last_block, "finished batch");

        Ok(Some(SealedBatch {
            batch_number: batch,
            fork_id,
            blocks,
            state_root,
            counters: used,
        }))
    }

    /// Waits for candidates and adds them to the open block until a timer,
    /// a signal or an overflow ends it.
    #[expect(clippy::too_many_arguments, reason = "block assembly state lives in the batch loop")]
    async fn fill_block<Src: CandidateSource>(
        &mut self,
        source: &mut Src,
        signals: &mut BatchSignals,
        batch_deadline: &mut Pin<&mut Sleep>,
        batch: u64,
        block: &OpenBlock,
        counters: &mut BatchCounterCollector,
        data_checker: &mut BlockDataChecker,
        added: &mut Vec<Candidate>,
        receipts: &mut Vec<Receipt>,
    ) -> Result<BlockEnd, SequencerError> {
        let number = block.header.number;
        if source.is_replay() {
            if signals.is_shutdown() {
                return Ok(BlockEnd::Shutdown);
            }
            return self
                .replay_decoded_block(source, batch, number, counters, data_checker, added, receipts)
                .await;
        }

        let block_deadline = sleep(self.config.block_seal_time());
        tokio::pin!(block_deadline);
        let log_interval = self.config.log_interval();
        let mut log_ticker = interval_at(Instant::now() + log_interval, log_interval);
        let mut poll_ticker = interval(self.config.pool_poll_interval());
        poll_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                changed = signals.shutdown.changed() => {
                    if changed.is_err() || *signals.shutdown.borrow() {
                        return Ok(BlockEnd::Shutdown);
                    }
                }

                _ = batch_deadline.as_mut() => return Ok(BlockEnd::CloseBatch),

                _ = signals.seal.notified() => {
                    info!(batch, block = number, "seal requested");
                    return Ok(BlockEnd::CloseBatch);
                }

                _ = &mut block_deadline => return Ok(BlockEnd::Sealed),

                _ = log_ticker.tick() => {
                    info!(batch, block = number, txs = added.len(), "waiting for transactions");
                }

                _ = poll_ticker.tick() => {
                    let candidates = match source.next_candidates().await {
                        Ok(candidates) => candidates,
                        Err(e) if !e.is_fatal() => {
                            warn!(error = %e, "failed to fetch candidates");
                            continue;
                        }
                        Err(e) => return Err(e),
                    };

                    for (i, candidate) in candidates.iter().enumerate() {
                        let hash = candidate.tx.hash();
                        match attempt_add_transaction(
                            &mut self.executor,
                            counters,
                            data_checker,
                            candidate,
                            false,
                        )? {
                            TxAttempt::Added(receipt) => {
                                added.push(candidate.clone());
                                receipts.push(receipt);
                            }
                            TxAttempt::Rejected(e) => {
                                debug!(tx_hash = %hash, error = %e, "dropping transaction");
                            }
                            TxAttempt::Overflow => {
                                info!(
                                    batch,
                                    tx_hash = %hash,
                                    txs_before_overflow = added.len(),
                                    "overflowed adding transaction to batch"
                                );
                                if added.is_empty() {
                                    return Err(SequencerError::SingleTransactionOverflow {
                                        hash,
                                        batch,
                                    });
                                }
                                let released: Vec<B256> =
                                    candidates[i..].iter().map(|c| c.tx.hash()).collect();
                                source.release(&released);
                                return Ok(BlockEnd::Overflow);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Reproduces one block of recovered L1 data. Timers do not apply and
    /// overflow is tolerated.
    #[expect(clippy::too_many_arguments, reason = "block assembly state lives in the batch loop")]
    async fn replay_decoded_block<Src: CandidateSource>(
        &mut self,
        source: &mut Src,
        batch: u64,
        number: u64,
        counters: &mut BatchCounterCollector,
        data_checker: &mut BlockDataChecker,
        added: &mut Vec<Candidate>,
        receipts: &mut Vec<Receipt>,
    ) -> Result<BlockEnd, SequencerError> {
        for candidate in source.next_candidates().await? {
            let hash = candidate.tx.hash();
            match attempt_add_transaction(
                &mut self.executor,
                counters,
                data_checker,
                &candidate,
                true,
            )? {
                TxAttempt::Added(receipt) => {
                    added.push(candidate);
                    receipts.push(receipt);
                }
                TxAttempt::Rejected(e) => {
                    warn!(batch, block = number, tx_hash = %hash, error = %e, "recovered transaction rejected");
                }
                TxAttempt::Overflow => {
                    warn!(batch, block = number, tx_hash = %hash, "recovered transaction overflows");
                }
            }
        }
        Ok(BlockEnd::Sealed)
    }

    /// Re-executes the transactions accepted before an overflow.
    fn replay_block(
        &mut self,
        number: u64,
        added: &[Candidate],
        counters: &mut BatchCounterCollector,
        data_checker: &mut BlockDataChecker,
        receipts: &mut Vec<Receipt>,
    ) -> Result<(), SequencerError> {
        for (index, candidate) in added.iter().enumerate() {
            match attempt_add_transaction(
                &mut self.executor,
                counters,
                data_checker,
                candidate,
                false,
            )? {
                TxAttempt::Added(receipt) => receipts.push(receipt),
                TxAttempt::Overflow => {
                    return Err(SequencerError::ReplayOverflow {
                        block: number,
                        index,
                    })
                }
                TxAttempt::Rejected(_) => {
                    return Err(SequencerError::ReplayRejected {
                        hash: candidate.tx.hash(),
                        block: number,
                    })
                }
            }
        }
        Ok(())
    }

    /// Seals the executed block and persists it with the sequencer progress.
    async fn finish_block<Src: CandidateSource>(
        &mut self,
        source: &mut Src,
        mut header: BlockHeader,
        batch: u64,
        added: &[Candidate],
        receipts: Vec<Receipt>,
    ) -> Result<B256, SequencerError> {
        header.state_root = self.executor.finish_block()?;
        let number = header.number;
        let state_root = header.state_root;

        let hashes: Vec<B256> = added.iter().map(|c| c.tx.hash()).collect();
        let block = L2Block {
            header,
            transactions: added.iter().map(|c| c.tx.clone()).collect(),
            receipts,
            effective_gas_percentages: added.iter().map(|c| c.effective_gas_percentage).collect(),
        };
        self.store.append_block(block, batch).await?;
        self.store.save_stage_progress(Stage::Execution, number).await?;
        self.store
            .save_stage_progress(Stage::HighestSeenBatchNumber, batch)
            .await?;

        if let Err(e) = source.commit(&hashes).await {
            warn!(block = number, error = %e, "failed to remove mined transactions from pool");
        }

        info!(batch, block = number, txs = hashes.len(), %state_root, "finished block");
        Ok(state_root)
    }
}
