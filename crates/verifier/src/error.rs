use thiserror::Error;
use zkseq_common::StorageError;

use crate::promise::PromiseCancelled;

/// Errors raised while verifying a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifierError {
    /// Every executor failed its liveness probe.
    #[error("no executor available")]
    NoExecutorAvailable,

    /// The executor failed for a reason it could not classify.
    #[error("executor reported an unknown error: {0}")]
    ExecutorUnknown(String),

    /// The executor could not be reached.
    #[error("executor transport error: {0}")]
    ExecutorTransport(String),

    /// The verification was aborted by a cancel-all.
    #[error("promise cancelled")]
    PromiseCancelled,

    /// A batch kept failing verification past its deadline.
    #[error("batch {batch} could not be verified within {timeout_secs}s")]
    StalenessTimeout { batch: u64, timeout_secs: u64 },

    /// Blocks of the batch are not visible in the chain snapshot yet.
    #[error("blocks of batch {batch} not yet available")]
    BlocksNotYetAvailable { batch: u64 },

    #[error("witness generation failed: {0}")]
    Witness(String),

    #[error("data stream encoding failed: {0}")]
    Encoding(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// Internal logic error. The pipeline must halt.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}

impl From<PromiseCancelled> for VerifierError {
    fn from(_: PromiseCancelled) -> Self {
        Self::PromiseCancelled
    }
}

impl From<StorageError> for VerifierError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl VerifierError {
    /// Whether re-dispatching the request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NoExecutorAvailable
                | Self::ExecutorUnknown(_)
                | Self::ExecutorTransport(_)
                | Self::BlocksNotYetAvailable { .. }
                | Self::Witness(_)
                | Self::Encoding(_)
                | Self::Storage(_)
        )
    }

    /// Whether sequencing must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StalenessTimeout { .. } | Self::InvariantViolated(_)
        )
    }
}
