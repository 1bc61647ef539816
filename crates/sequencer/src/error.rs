use thiserror::Error;
use zkseq_common::{ExecutionError, StorageError, B256};
use zkseq_verifier::VerifierError;

/// Errors raised while sequencing.
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("execution: {0}")]
    Execution(#[from] ExecutionError),

    #[error("verification: {0}")]
    Verifier(#[from] VerifierError),

    /// No fork is active for the batch about to be opened.
    #[error("no fork configured for batch {batch}")]
    NoForkForBatch { batch: u64 },

    /// A transaction overflows the counters of an otherwise empty batch and
    /// can never be sequenced.
    #[error("transaction {hash} alone overflows the counters of batch {batch}")]
    SingleTransactionOverflow { hash: B256, batch: u64 },

    /// Replaying a block after an overflow overflowed again.
    #[error("overflow while replaying transaction {index} of block {block}")]
    ReplayOverflow { block: u64, index: usize },

    /// Replaying a block after an overflow rejected a transaction that was
    /// accepted before.
    #[error("transaction {hash} rejected while replaying block {block}")]
    ReplayRejected { hash: B256, block: u64 },

    #[error("block {0} not found")]
    MissingBlock(u64),

    #[error("transaction pool: {0}")]
    Pool(String),

    #[error("data stream: {0}")]
    Stream(String),

    #[error(transparent)]
    Other(#[from] eyre::Error),
}

impl SequencerError {
    /// Whether the sequencer must halt and wait for an operator.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::NoForkForBatch { .. } | Self::Pool(_) => false,
            Self::Verifier(e) => e.is_fatal(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(!SequencerError::NoForkForBatch { batch: 1 }.is_fatal());
        assert!(!SequencerError::Pool("timeout".into()).is_fatal());
        assert!(SequencerError::ReplayOverflow { block: 4, index: 0 }.is_fatal());
        assert!(SequencerError::SingleTransactionOverflow {
            hash: B256::ZERO,
            batch: 2,
        }
        .is_fatal());

        let stale = VerifierError::StalenessTimeout {
            batch: 3,
            timeout_secs: 1800,
        };
        assert!(SequencerError::from(stale).is_fatal());
        assert!(!SequencerError::from(VerifierError::NoExecutorAvailable).is_fatal());
    }
}
