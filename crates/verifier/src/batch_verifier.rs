//! Ordered queue of outstanding batch verifications.

use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    mem,
    sync::Arc,
    time::Duration,
};

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, error, info};
use zkseq_common::B256;

use crate::{
    error::VerifierError,
    legacy::BatchDispatcher,
    promise::Promise,
    types::{VerifierBundle, VerifierRequest, VerifierResponse},
};

#[derive(Debug)]
struct QueueEntry {
    request: VerifierRequest,
    block_numbers: Vec<u64>,
    promise: Promise<VerifierResponse, VerifierError>,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: VecDeque<QueueEntry>,
    batches: HashSet<u64>,
}

/// Results surfaced by one [`BatchVerifier::check_progress`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Completed verifications, in ascending batch order.
    pub bundles: Vec<VerifierBundle>,
    /// Entries still queued.
    pub remaining: usize,
}

/// Keeps verifications in batch order and surfaces their results from the
/// head of the queue only.
#[derive(Debug)]
pub struct BatchVerifier<D> {
    dispatcher: Arc<D>,
    staleness_timeout: Duration,
    queue: Mutex<QueueState>,
}

impl<D: BatchDispatcher> BatchVerifier<D> {
    pub fn new(dispatcher: Arc<D>, staleness_timeout: Duration) -> Self {
        Self {
            dispatcher,
            staleness_timeout,
            queue: Mutex::new(QueueState::default()),
        }
    }

    /// Queues verification of a closed batch. Batches must be added in
    /// ascending order.
    pub fn add_new_check(
        &self,
        batch_number: u64,
        block_number: u64,
        fork_id: u64,
        state_root: B256,
        counters: BTreeMap<String, i64>,
        block_numbers: Vec<u64>,
    ) {
        let request =
            VerifierRequest::new(batch_number, block_number, fork_id, state_root, counters);
        let promise = self
            .dispatcher
            .dispatch(request.clone(), block_numbers.clone());

        let mut queue = self.queue.lock();
        queue.batches.insert(batch_number);
        queue.entries.push_back(QueueEntry {
            request,
            block_numbers,
            promise,
        });
        debug!(
            batch = batch_number,
            block = block_number,
            queued = queue.entries.len(),
            "verification queued"
        );
    }

    pub fn is_request_added(&self, batch_number: u64) -> bool {
        self.queue.lock().batches.contains(&batch_number)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().entries.len()
    }

    /// Collects settled results from the head of the queue.
    ///
    /// Stops at the first pending entry. A failed entry is re-dispatched in
    /// place and also stops the walk. A failed entry past the staleness
    /// timeout is fatal and leaves the queue as it was.
    pub fn check_progress(&self) -> Result<Progress, VerifierError> {
        let mut queue = self.queue.lock();
        let mut bundles = Vec::new();

        for entry in queue.entries.iter_mut() {
            let Some(outcome) = entry.promise.try_get() else {
                break;
            };

            match outcome {
                Ok(response) => bundles.push(VerifierBundle {
                    request: entry.request.clone(),
                    response,
                    block_numbers: entry.block_numbers.clone(),
                }),
                Err(VerifierError::PromiseCancelled) => {
                    return Err(VerifierError::InvariantViolated(format!(
                        "verification of batch {} was cancelled outside of a drain",
                        entry.request.batch_number
                    )));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    if entry.request.is_overdue(self.staleness_timeout) {
                        error!(
                            batch = entry.request.batch_number,
                            check_count = entry.request.check_count,
                            error = %e,
                            "batch verification stale, giving up"
                        );
                        return Err(VerifierError::StalenessTimeout {
                            batch: entry.request.batch_number,
                            timeout_secs: self.staleness_timeout.as_secs(),
                        });
                    }

                    entry.request.increment_check_count();
                    debug!(
                        batch = entry.request.batch_number,
                        check_count = entry.request.check_count,
                        error = %e,
                        "re-dispatching verification"
                    );
                    entry.promise = self
                        .dispatcher
                        .dispatch(entry.request.clone(), entry.block_numbers.clone());
                    break;
                }
            }
        }

        for bundle in &bundles {
            queue.entries.pop_front();
            queue.batches.remove(&bundle.request.batch_number);
        }

        Ok(Progress {
            bundles,
            remaining: queue.entries.len(),
        })
    }

    /// Waits until every queued verification has settled.
    pub async fn wait_for_finish(&self) {
        let promises: Vec<_> = self
            .queue
            .lock()
            .entries
            .iter()
            .map(|e| e.promise.clone())
            .collect();
        // Outcomes are collected by `check_progress`.
        join_all(promises.iter().map(Promise::wait)).await;
    }

    /// Cancels every queued verification, drains the executors and empties
    /// the queue.
    pub async fn cancel_all(&self) {
        let entries = {
            let mut queue = self.queue.lock();
            queue.batches.clear();
            mem::take(&mut queue.entries)
        };
        info!(cancelled = entries.len(), "cancelling queued verifications");
        for entry in &entries {
            entry.promise.cancel();
        }
        self.dispatcher.cancel_all().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::{
        sync::oneshot,
        task::yield_now,
        time::advance,
    };

    use super::*;

    type Outcome = Result<VerifierResponse, VerifierError>;

    /// Dispatcher whose promises are settled by hand.
    #[derive(Debug, Default)]
    struct ManualDispatcher {
        senders: Mutex<BTreeMap<u64, Vec<oneshot::Sender<Outcome>>>>,
        dispatches: AtomicUsize,
        drained: AtomicUsize,
    }

    impl ManualDispatcher {
        fn settle(&self, batch: u64, outcome: Outcome) {
            let sender = self
                .senders
                .lock()
                .get_mut(&batch)
                .and_then(|s| s.pop())
                .unwrap();
            sender.send(outcome).unwrap();
        }
    }

    #[async_trait]
    impl BatchDispatcher for ManualDispatcher {
        fn dispatch(
            &self,
            request: VerifierRequest,
            _block_numbers: Vec<u64>,
        ) -> Promise<VerifierResponse, VerifierError> {
            self.dispatches.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = oneshot::channel();
            self.senders
                .lock()
                .entry(request.batch_number)
                .or_default()
                .push(tx);
            Promise::new(|| async move {
                rx.await.unwrap_or(Err(VerifierError::PromiseCancelled))
            })
        }

        async fn cancel_all(&self) {
            self.drained.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn valid(batch: u64) -> Outcome {
        Ok(VerifierResponse {
            batch_number: batch,
            block_number: batch * 10,
            valid: true,
            witness: Default::default(),
            executor_payload: None,
            error: None,
        })
    }

    fn verifier() -> (Arc<ManualDispatcher>, BatchVerifier<ManualDispatcher>) {
        let dispatcher = Arc::new(ManualDispatcher::default());
        let verifier = BatchVerifier::new(dispatcher.clone(), Duration::from_secs(1800));
        (dispatcher, verifier)
    }

    fn add(verifier: &BatchVerifier<ManualDispatcher>, batch: u64) {
        let block = batch * 10;
        verifier.add_new_check(batch, block, 9, B256::ZERO, BTreeMap::new(), vec![block]);
    }

    async fn settle_and_yield(dispatcher: &ManualDispatcher, batch: u64, outcome: Outcome) {
        dispatcher.settle(batch, outcome);
        for _ in 0..4 {
            yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_results_surface_in_batch_order() {
        let (dispatcher, verifier) = verifier();
        add(&verifier, 1);
        add(&verifier, 2);
        assert!(verifier.is_request_added(1));

        settle_and_yield(&dispatcher, 2, valid(2)).await;
        let progress = verifier.check_progress().unwrap();
        assert!(progress.bundles.is_empty());
        assert_eq!(progress.remaining, 2);

        settle_and_yield(&dispatcher, 1, valid(1)).await;
        let progress = verifier.check_progress().unwrap();
        let batches: Vec<u64> = progress.bundles.iter().map(|b| b.request.batch_number).collect();
        assert_eq!(batches, vec![1, 2]);
        assert_eq!(progress.remaining, 0);
        assert!(!verifier.is_request_added(1));
        assert!(progress.bundles[0].is_valid());
        assert_eq!(progress.bundles[0].first_block(), Some(10));
    }

    #[tokio::test]
    async fn test_failed_entry_redispatched_in_place() {
        let (dispatcher, verifier) = verifier();
        add(&verifier, 1);
        add(&verifier, 2);
        settle_and_yield(&dispatcher, 2, valid(2)).await;
        settle_and_yield(&dispatcher, 1, Err(VerifierError::NoExecutorAvailable)).await;

        let progress = verifier.check_progress().unwrap();
        assert!(progress.bundles.is_empty());
        assert_eq!(progress.remaining, 2);
        assert_eq!(verifier.queue_len(), 2);
        assert_eq!(dispatcher.dispatches.load(Ordering::SeqCst), 3);

        // the fresh promise for batch 1 is still pending
        assert!(verifier.check_progress().unwrap().bundles.is_empty());

        settle_and_yield(&dispatcher, 1, valid(1)).await;
        let progress = verifier.check_progress().unwrap();
        assert_eq!(progress.bundles.len(), 2);
        assert_eq!(progress.bundles[0].request.check_count, 1);
        assert_eq!(progress.bundles[1].request.check_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_failure_is_fatal_and_keeps_queue() {
        let (dispatcher, verifier) = verifier();
        add(&verifier, 1);
        add(&verifier, 2);

        advance(Duration::from_secs(1801)).await;
        let down = Err(VerifierError::ExecutorTransport("down".into()));
        settle_and_yield(&dispatcher, 1, down).await;

        let err = verifier.check_progress().unwrap_err();
        assert_eq!(
            err,
            VerifierError::StalenessTimeout {
                batch: 1,
                timeout_secs: 1800
            }
        );
        assert!(err.is_fatal());
        assert_eq!(verifier.queue_len(), 2);
        assert_eq!(dispatcher.dispatches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancellation_outside_drain_is_invariant_violation() {
        let (dispatcher, verifier) = verifier();
        add(&verifier, 1);
        settle_and_yield(&dispatcher, 1, Err(VerifierError::PromiseCancelled)).await;

        let err = verifier.check_progress().unwrap_err();
        assert!(matches!(err, VerifierError::InvariantViolated(_)));
        assert_eq!(verifier.queue_len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_all_clears_queue() {
        let (dispatcher, verifier) = verifier();
        add(&verifier, 1);
        add(&verifier, 2);

        verifier.cancel_all().await;
        assert_eq!(verifier.queue_len(), 0);
        assert!(!verifier.is_request_added(1));
        assert_eq!(dispatcher.drained.load(Ordering::SeqCst), 1);
        assert!(verifier.check_progress().unwrap().bundles.is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_finish() {
        let (dispatcher, verifier) = verifier();
        let verifier = Arc::new(verifier);
        add(&verifier, 1);
        add(&verifier, 2);

        let waiter = verifier.clone();
        let handle = tokio::spawn(async move { waiter.wait_for_finish().await });

        dispatcher.settle(1, valid(1));
        dispatcher.settle(2, valid(2));
        handle.await.unwrap();

        assert_eq!(verifier.check_progress().unwrap().bundles.len(), 2);
    }
}
