//! Single-assignment result of a background computation.

use std::{fmt, future::Future, sync::Arc};

use parking_lot::Mutex;
use tokio::{sync::Notify, task::AbortHandle};

/// Settlement of a [`Promise`] that was cancelled before it completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromiseCancelled;

struct Inner<T, E> {
    outcome: Mutex<Option<Result<T, E>>>,
    settled: Notify,
    abort: Mutex<Option<AbortHandle>>,
}

impl<T, E> Inner<T, E> {
    fn pending() -> Self {
        Self {
            outcome: Mutex::new(None),
            settled: Notify::new(),
            abort: Mutex::new(None),
        }
    }

    /// Stores `outcome` if nothing was stored yet. Returns whether it did.
    fn settle(&self, outcome: Result<T, E>) -> bool {
        {
            let mut slot = self.outcome.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
        }
        self.settled.notify_waiters();
        true
    }
}

/// Handle to a computation running on the tokio runtime.
///
/// A promise transitions from pending to either a value or an error exactly
/// once. Clones share the same outcome.
pub struct Promise<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.inner.outcome.lock().is_some() {
            "settled"
        } else {
            "pending"
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + From<PromiseCancelled> + 'static,
{
    /// Starts `f` on a background task. Must be called within a tokio
    /// runtime.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let inner = Arc::new(Inner::pending());
        let task_inner = inner.clone();
        let fut = f();
        let handle = tokio::spawn(async move {
            let outcome = fut.await;
            task_inner.settle(outcome);
        });
        *inner.abort.lock() = Some(handle.abort_handle());
        Self { inner }
    }

    /// Runs `f` immediately. The returned promise is already settled.
    pub fn new_sync<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, E>,
    {
        let inner = Arc::new(Inner::pending());
        inner.settle(f());
        Self { inner }
    }

    /// Returns the outcome without blocking, or `None` while pending.
    pub fn try_get(&self) -> Option<Result<T, E>> {
        self.inner.outcome.lock().clone()
    }

    pub fn is_settled(&self) -> bool {
        self.inner.outcome.lock().is_some()
    }

    /// Aborts the background task. A pending promise settles with
    /// [`PromiseCancelled`]; a settled one keeps its outcome.
    ///
    /// Returns whether this call settled the promise.
    pub fn cancel(&self) -> bool {
        let settled = self.inner.settle(Err(E::from(PromiseCancelled)));
        if let Some(handle) = self.inner.abort.lock().take() {
            handle.abort();
        }
        settled
    }

    /// Waits until the promise settles.
    pub async fn wait(&self) -> Result<T, E> {
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.try_get() {
                return outcome;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{sync::oneshot, time::sleep};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum TestError {
        Failed,
        Cancelled,
    }

    impl From<PromiseCancelled> for TestError {
        fn from(_: PromiseCancelled) -> Self {
            Self::Cancelled
        }
    }

    #[tokio::test]
    async fn test_promise_pending_until_task_completes() {
        let (tx, rx) = oneshot::channel::<u64>();
        let promise: Promise<u64, TestError> =
            Promise::new(|| async move { rx.await.map_err(|_| TestError::Failed) });

        assert!(promise.try_get().is_none());
        assert!(!promise.is_settled());

        tx.send(7).unwrap();
        assert_eq!(promise.wait().await, Ok(7));
        assert_eq!(promise.try_get(), Some(Ok(7)));
    }

    #[tokio::test]
    async fn test_promise_sync_is_settled_immediately() {
        let promise: Promise<u64, TestError> = Promise::new_sync(|| Err(TestError::Failed));
        assert_eq!(promise.try_get(), Some(Err(TestError::Failed)));
        assert!(!promise.cancel());
        assert_eq!(promise.try_get(), Some(Err(TestError::Failed)));
    }

    #[tokio::test]
    async fn test_promise_cancel_settles_pending() {
        let promise: Promise<u64, TestError> = Promise::new(|| async {
            sleep(Duration::from_secs(3600)).await;
            Ok(1)
        });
        let waiter = promise.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });

        assert!(promise.cancel());
        assert!(!promise.cancel());
        assert_eq!(handle.await.unwrap(), Err(TestError::Cancelled));
        assert_eq!(promise.try_get(), Some(Err(TestError::Cancelled)));
    }

    #[tokio::test]
    async fn test_promise_clones_share_outcome() {
        let promise: Promise<u64, TestError> = Promise::new(|| async { Ok(3) });
        let other = promise.clone();
        assert_eq!(other.wait().await, Ok(3));
        assert_eq!(promise.try_get(), Some(Ok(3)));
        assert!(format!("{promise:?}").contains("settled"));
    }
}
