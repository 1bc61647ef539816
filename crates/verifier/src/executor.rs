//! External executors and round-robin selection among them.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};
use zkseq_common::B256;

use crate::types::{ExecutorPayload, VerifierRequest};

/// Errors reported by an executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// Re-execution produced a different state root.
    #[error("state root mismatch: expected {expected}, got {actual}")]
    StateRootMismatch { expected: B256, actual: B256 },

    #[error("unknown executor error: {0}")]
    Unknown(String),

    #[error("transport: {0}")]
    Transport(String),

    /// The request was dropped by a cancel-all.
    #[error("request cancelled")]
    Cancelled,
}

/// Verdict of a successful executor round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorVerdict {
    pub accepted: bool,
    pub new_state_root: B256,
}

/// Client of a remote stateless executor.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait ExecutorClient: Send + Sync {
    fn name(&self) -> String;

    /// Liveness probe.
    async fn check_online(&self) -> bool;

    /// Re-executes the batch described by `payload` from `old_state_root`
    /// and compares the outcome with `request`.
    async fn verify(
        &self,
        payload: ExecutorPayload,
        request: VerifierRequest,
        old_state_root: B256,
    ) -> Result<ExecutorVerdict, ExecutorError>;

    /// Number of requests in flight.
    fn queue_length(&self) -> usize;

    /// Fails every in-flight request and rejects new ones.
    fn cancel_all(&self);

    /// Accepts requests again after [`ExecutorClient::cancel_all`].
    fn allow_all(&self);
}

/// Executors selected in round-robin order.
pub struct ExecutorPool {
    executors: Vec<Arc<dyn ExecutorClient>>,
    cursor: Mutex<usize>,
}

impl fmt::Debug for ExecutorPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.executors.iter().map(|e| e.name()).collect();
        f.debug_struct("ExecutorPool")
            .field("executors", &names)
            .field("cursor", &*self.cursor.lock())
            .finish()
    }
}

impl ExecutorPool {
    pub fn new(executors: Vec<Arc<dyn ExecutorClient>>) -> Self {
        Self {
            executors,
            cursor: Mutex::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    /// Next executor that answers its liveness probe, trying each executor
    /// at most once.
    pub async fn select_online(&self) -> Option<Arc<dyn ExecutorClient>> {
        for _ in 0..self.executors.len() {
            let candidate = {
                let mut cursor = self.cursor.lock();
                *cursor = (*cursor + 1) % self.executors.len();
                self.executors[*cursor].clone()
            };
            if candidate.check_online().await {
                return Some(candidate);
            }
            debug!(executor = %candidate.name(), "executor offline, trying next");
        }
        warn!(executors = self.executors.len(), "no executor online");
        None
    }

    /// Cancels in-flight work on every executor, waits for their queues to
    /// drain and re-enables them.
    pub async fn cancel_all_and_drain(&self, poll_interval: Duration) {
        for executor in &self.executors {
            executor.cancel_all();
        }
        for executor in &self.executors {
            while executor.queue_length() > 0 {
                sleep(poll_interval).await;
            }
        }
        for executor in &self.executors {
            executor.allow_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn executor(name: &'static str, online: bool) -> Arc<dyn ExecutorClient> {
        let mut mock = MockExecutorClient::new();
        mock.expect_name().returning(move || name.to_string());
        mock.expect_check_online().returning(move || online);
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_select_skips_offline_executors() {
        let pool = ExecutorPool::new(vec![
            executor("a", false),
            executor("b", true),
            executor("c", false),
        ]);

        for _ in 0..6 {
            let selected = pool.select_online().await.unwrap();
            assert_eq!(selected.name(), "b");
        }
    }

    #[tokio::test]
    async fn test_select_round_robin() {
        let pool = ExecutorPool::new(vec![executor("a", true), executor("b", true)]);
        let names: Vec<String> = collect_names(&pool, 4).await;
        assert_eq!(names, vec!["b", "a", "b", "a"]);
    }

    async fn collect_names(pool: &ExecutorPool, n: usize) -> Vec<String> {
        let mut names = Vec::new();
        for _ in 0..n {
            names.push(pool.select_online().await.unwrap().name());
        }
        names
    }

    #[tokio::test]
    async fn test_select_none_online() {
        let pool = ExecutorPool::new(vec![executor("a", false), executor("b", false)]);
        assert!(pool.select_online().await.is_none());
        assert!(ExecutorPool::empty().select_online().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_waits_for_drain() {
        let remaining = Arc::new(AtomicUsize::new(3));
        let mut mock = MockExecutorClient::new();
        mock.expect_cancel_all().times(1).return_const(());
        let queue = remaining.clone();
        mock.expect_queue_length()
            .returning(move || queue.fetch_sub(1, Ordering::SeqCst).saturating_sub(1));
        mock.expect_allow_all().times(1).return_const(());

        let pool = ExecutorPool::new(vec![Arc::new(mock)]);
        pool.cancel_all_and_drain(Duration::from_millis(1)).await;
        assert_eq!(remaining.load(Ordering::SeqCst), 0);
    }
}
