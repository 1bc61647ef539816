//! Verification of closed batches on external executors.

use std::{collections::BTreeMap, fmt, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use zkseq_common::{
    Address, Bytes, ChainStore, ChainView, DataStreamEncoder, StateCommitment, B256,
};
use zkseq_config::VerifierConfig;

use crate::{
    error::VerifierError,
    executor::{ExecutorError, ExecutorPool},
    promise::Promise,
    types::{ExecutorPayload, VerifierRequest, VerifierResponse},
};

/// Turns a [`VerifierRequest`] into a running verification.
#[async_trait]
pub trait BatchDispatcher: Send + Sync + 'static {
    /// Starts verifying the batch covering `block_numbers`.
    fn dispatch(
        &self,
        request: VerifierRequest,
        block_numbers: Vec<u64>,
    ) -> Promise<VerifierResponse, VerifierError>;

    /// Aborts in-flight verifications and waits until executors are idle.
    async fn cancel_all(&self);
}

/// Dispatches batches to a pool of stateless executors.
///
/// Payloads are assembled from a single chain snapshot taken when the
/// request is dispatched. With an empty pool every batch is accepted
/// without contacting anyone.
pub struct LegacyExecutorVerifier<S, C, E> {
    config: VerifierConfig,
    pool: Arc<ExecutorPool>,
    store: Arc<S>,
    state: Arc<C>,
    encoder: Arc<E>,
    dispatched: Mutex<BTreeMap<u64, u32>>,
}

impl<S, C, E> fmt::Debug for LegacyExecutorVerifier<S, C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyExecutorVerifier")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl<S, C, E> LegacyExecutorVerifier<S, C, E>
where
    S: ChainStore + 'static,
    C: StateCommitment + 'static,
    E: DataStreamEncoder + 'static,
{
    pub fn new(
        config: VerifierConfig,
        pool: ExecutorPool,
        store: Arc<S>,
        state: Arc<C>,
        encoder: Arc<E>,
    ) -> Self {
        if config.has_executors() && pool.is_empty() {
            warn!(
                urls = config.executor_urls.len(),
                "executor urls configured but no executor clients supplied, accepting every batch"
            );
        }
        Self {
            config,
            pool: Arc::new(pool),
            store,
            state,
            encoder,
            dispatched: Mutex::new(BTreeMap::new()),
        }
    }

    /// Whether `batch` has been dispatched at least once.
    pub fn is_request_added(&self, batch: u64) -> bool {
        self.dispatched.lock().contains_key(&batch)
    }

    /// Number of times `batch` has been dispatched.
    pub fn dispatch_count(&self, batch: u64) -> u32 {
        self.dispatched.lock().get(&batch).copied().unwrap_or_default()
    }

    fn record_dispatch(&self, batch: u64) {
        *self.dispatched.lock().entry(batch).or_default() += 1;
    }
}

#[async_trait]
impl<S, C, E> BatchDispatcher for LegacyExecutorVerifier<S, C, E>
where
    S: ChainStore + 'static,
    C: StateCommitment + 'static,
    E: DataStreamEncoder + 'static,
{
    fn dispatch(
        &self,
        request: VerifierRequest,
        block_numbers: Vec<u64>,
    ) -> Promise<VerifierResponse, VerifierError> {
        self.record_dispatch(request.batch_number);

        if self.pool.is_empty() {
            return Promise::new_sync(|| Ok(VerifierResponse::trusted(&request)));
        }

        let view = match self.store.view() {
            Ok(view) => view,
            Err(e) => return Promise::new_sync(move || Err(VerifierError::from(e))),
        };

        let job = VerificationJob {
            pool: self.pool.clone(),
            state: self.state.clone(),
            encoder: self.encoder.clone(),
            timestamp_limit_margin: self.config.timestamp_limit_margin_secs,
        };
        Promise::new(move || job.run(view, request, block_numbers))
    }

    async fn cancel_all(&self) {
        info!("cancelling all verifications");
        self.pool
            .cancel_all_and_drain(self.config.drain_poll_interval())
            .await;
        self.dispatched.lock().clear();
    }
}

/// Everything one background verification needs, detached from the
/// verifier.
struct VerificationJob<C, E> {
    pool: Arc<ExecutorPool>,
    state: Arc<C>,
    encoder: Arc<E>,
    timestamp_limit_margin: u64,
}

impl<C, E> VerificationJob<C, E>
where
    C: StateCommitment + 'static,
    E: DataStreamEncoder + 'static,
{
    async fn run<V: ChainView>(
        self,
        view: V,
        request: VerifierRequest,
        block_numbers: Vec<u64>,
    ) -> Result<VerifierResponse, VerifierError> {
        let batch = request.batch_number;
        let (Some(&first), Some(&last)) = (block_numbers.first(), block_numbers.last()) else {
            return Err(VerifierError::BlocksNotYetAvailable { batch });
        };

        let mut data_stream = Vec::new();
        let mut last_timestamp = 0;
        let mut coinbase = Address::ZERO;
        for (i, number) in block_numbers.iter().enumerate() {
            let block = view
                .block_by_number(*number)?
                .ok_or(VerifierError::BlocksNotYetAvailable { batch })?;
            let previous_batch = if i == 0 { batch.saturating_sub(1) } else { batch };
            let entries = self
                .encoder
                .encode(&block, batch, previous_batch)
                .map_err(|e| VerifierError::Encoding(e.to_string()))?;
            data_stream.extend_from_slice(&entries);
            last_timestamp = block.header.timestamp;
            coinbase = block.header.coinbase;
        }

        let old_state_root = view
            .header_by_number(first.saturating_sub(1))?
            .ok_or(VerifierError::BlocksNotYetAvailable { batch })?
            .state_root;

        let witness = self
            .state
            .witness(first, last)
            .await
            .map_err(|e| VerifierError::Witness(e.to_string()))?;
        debug!(batch, first, last, witness_len = witness.len(), "witness generated");

        let payload = ExecutorPayload {
            witness: witness.clone(),
            data_stream: Bytes::from(data_stream),
            coinbase,
            old_acc_input_hash: B256::ZERO,
            l1_info_root: None,
            timestamp_limit: last_timestamp.saturating_add(self.timestamp_limit_margin),
            forced_blockhash_l1: Bytes::from_static(&[0]),
            context_id: batch.to_string(),
            l1_info_tree_min_timestamps: BTreeMap::new(),
        };

        let executor = self
            .pool
            .select_online()
            .await
            .ok_or(VerifierError::NoExecutorAvailable)?;
        let executor_name = executor.name();

        let result = executor
            .verify(payload.clone(), request.clone(), old_state_root)
            .await;

        let mut response = VerifierResponse {
            batch_number: batch,
            block_number: request.block_number,
            valid: false,
            witness,
            executor_payload: Some(payload),
            error: None,
        };

        match result {
            Ok(verdict) => {
                if !verdict.accepted {
                    warn!(batch, executor = %executor_name, "executor rejected batch");
                }
                response.valid = verdict.accepted;
                Ok(response)
            }
            Err(e @ ExecutorError::StateRootMismatch { .. }) => {
                error!(batch, executor = %executor_name, error = %e, "batch failed verification");
                response.error = Some(e.to_string());
                Ok(response)
            }
            Err(ExecutorError::Unknown(msg)) => {
                error!(batch, executor = %executor_name, error = %msg, "executor error");
                Err(VerifierError::ExecutorUnknown(msg))
            }
            Err(ExecutorError::Transport(msg)) => {
                warn!(batch, executor = %executor_name, error = %msg, "executor unreachable");
                Err(VerifierError::ExecutorTransport(msg))
            }
            Err(ExecutorError::Cancelled) => Err(VerifierError::PromiseCancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use zkseq_common::test_utils::{
        empty_block, FixedStateCommitment, InMemoryChainStore, TestStreamEncoder,
    };

    use super::*;
    use crate::executor::{ExecutorClient, ExecutorVerdict, MockExecutorClient};

    type TestVerifier =
        LegacyExecutorVerifier<InMemoryChainStore, FixedStateCommitment, TestStreamEncoder>;

    async fn store_with_batch() -> Arc<InMemoryChainStore> {
        let store = InMemoryChainStore::new(B256::repeat_byte(0xaa), 1_000);
        for n in 1..=3 {
            let mut block = empty_block(n, 1_000 + n);
            block.header.coinbase = Address::repeat_byte(0x22);
            store.append_block(block, 1).await.unwrap();
        }
        Arc::new(store)
    }

    fn build_verifier(
        store: Arc<InMemoryChainStore>,
        executors: Vec<Arc<dyn ExecutorClient>>,
    ) -> TestVerifier {
        let config = VerifierConfig::default().with_executor_urls(vec!["http://exec".into()]);
        LegacyExecutorVerifier::new(
            config,
            ExecutorPool::new(executors),
            store,
            Arc::new(FixedStateCommitment::default()),
            Arc::new(TestStreamEncoder),
        )
    }

    fn request() -> VerifierRequest {
        VerifierRequest::new(1, 3, 9, B256::with_last_byte(3), BTreeMap::new())
    }

    fn executor_returning(
        result: Result<ExecutorVerdict, ExecutorError>,
    ) -> Arc<dyn ExecutorClient> {
        let mut mock = MockExecutorClient::new();
        mock.expect_name().returning(|| "exec".to_string());
        mock.expect_check_online().returning(|| true);
        mock.expect_verify().returning(move |payload, request, old_root| {
                assert_eq!(request.batch_number, 1);
                assert_eq!(old_root, B256::repeat_byte(0xaa));
                assert_eq!(payload.timestamp_limit, 1_003 + 300);
                assert_eq!(payload.context_id, "1");
                assert_eq!(payload.coinbase, Address::repeat_byte(0x22));
                assert_eq!(payload.forced_blockhash_l1.as_ref(), &[0u8]);
                assert_eq!(payload.data_stream.len(), 3 * 56);
                result.clone()
            });
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_no_executors_accepts_synchronously() {
        let store = store_with_batch().await;
        let verifier = LegacyExecutorVerifier::new(
            VerifierConfig::default(),
            ExecutorPool::empty(),
            store,
            Arc::new(FixedStateCommitment::default()),
            Arc::new(TestStreamEncoder),
        );

        let promise = verifier.dispatch(request(), vec![1, 2, 3]);
        let response = promise.try_get().unwrap().unwrap();
        assert!(response.valid);
        assert!(verifier.is_request_added(1));
        assert!(!verifier.is_request_added(2));
    }

    #[tokio::test]
    async fn test_dispatch_builds_payload_from_snapshot() {
        let store = store_with_batch().await;
        let verdict = ExecutorVerdict {
            accepted: true,
            new_state_root: B256::with_last_byte(3),
        };
        let verifier = build_verifier(store, vec![executor_returning(Ok(verdict))]);

        let response = verifier.dispatch(request(), vec![1, 2, 3]).wait().await.unwrap();
        assert!(response.valid);
        assert_eq!(response.block_number, 3);
        let payload = response.executor_payload.unwrap();
        assert_eq!(payload.witness, response.witness);
        assert!(payload.l1_info_root.is_none());
        assert!(payload.l1_info_tree_min_timestamps.is_empty());
    }

    #[tokio::test]
    async fn test_state_root_mismatch_is_invalid_response() {
        let store = store_with_batch().await;
        let mismatch = ExecutorError::StateRootMismatch {
            expected: B256::with_last_byte(3),
            actual: B256::with_last_byte(4),
        };
        let verifier = build_verifier(store, vec![executor_returning(Err(mismatch))]);

        let response = verifier.dispatch(request(), vec![1, 2, 3]).wait().await.unwrap();
        assert!(!response.valid);
        assert!(response.error.unwrap().contains("state root mismatch"));
    }

    #[tokio::test]
    async fn test_executor_failures_are_errors() {
        let store = store_with_batch().await;
        let verifier = build_verifier(
            store.clone(),
            vec![executor_returning(Err(ExecutorError::Unknown("boom".into())))],
        );
        let err = verifier.dispatch(request(), vec![1, 2, 3]).wait().await.unwrap_err();
        assert_eq!(err, VerifierError::ExecutorUnknown("boom".into()));
        assert!(err.is_retryable());

        let verifier = verifier_with_offline(store);
        let err = verifier.dispatch(request(), vec![1, 2, 3]).wait().await.unwrap_err();
        assert_eq!(err, VerifierError::NoExecutorAvailable);
    }

    fn verifier_with_offline(store: Arc<InMemoryChainStore>) -> TestVerifier {
        let executors = (0..3)
            .map(|_| {
                let mut mock = MockExecutorClient::new();
                mock.expect_name().returning(|| "offline".to_string());
                mock.expect_check_online().returning(|| false);
                Arc::new(mock) as Arc<dyn ExecutorClient>
            })
            .collect();
        build_verifier(store, executors)
    }

    #[tokio::test]
    async fn test_missing_blocks_not_yet_available() {
        let store = store_with_batch().await;
        let verifier = verifier_with_offline(store);

        let err = verifier.dispatch(request(), vec![]).wait().await.unwrap_err();
        assert_eq!(err, VerifierError::BlocksNotYetAvailable { batch: 1 });

        let err = verifier.dispatch(request(), vec![4, 5]).wait().await.unwrap_err();
        assert_eq!(err, VerifierError::BlocksNotYetAvailable { batch: 1 });
        assert_eq!(verifier.dispatch_count(1), 2);
    }

    #[tokio::test]
    async fn test_cancel_all_drains_executors() {
        let mut mock = MockExecutorClient::new();
        mock.expect_name().returning(|| "exec".to_string());
        mock.expect_cancel_all().times(1).return_const(());
        mock.expect_queue_length().returning(|| 0);
        mock.expect_allow_all().times(1).return_const(());

        let store = store_with_batch().await;
        let verifier = build_verifier(store, vec![Arc::new(mock)]);
        verifier.record_dispatch(1);
        verifier.cancel_all().await;
        assert!(!verifier.is_request_added(1));
    }
}
