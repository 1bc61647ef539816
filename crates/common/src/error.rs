use alloy_primitives::B256;
use thiserror::Error;

/// Errors that can occur during chain storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A block expected to exist is missing.
    #[error("block {0} not found")]
    BlockNotFound(u64),

    /// Attempted to append a block that does not extend the tip.
    #[error("non-contiguous block: attempted {attempted} but tip is {tip}")]
    NonContiguousBlock { attempted: u64, tip: u64 },

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Other unspecified error.
    #[error(transparent)]
    Other(#[from] eyre::Error),
}

impl StorageError {
    /// Creates a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }
}

/// Errors reported by a block executor.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The transaction cannot be applied to the current state, e.g. bad
    /// nonce or insufficient balance. It is dropped from the block.
    #[error("transaction {hash} rejected: {reason}")]
    InvalidTransaction { hash: B256, reason: String },

    /// No block is open on the executor.
    #[error("no open block")]
    NoOpenBlock,

    #[error("state access failed: {0}")]
    State(#[from] StorageError),

    #[error(transparent)]
    Other(#[from] eyre::Error),
}

impl ExecutionError {
    pub fn invalid_transaction(hash: B256, reason: impl Into<String>) -> Self {
        Self::InvalidTransaction {
            hash,
            reason: reason.into(),
        }
    }

    /// Whether only the transaction is at fault and the block can continue.
    pub fn is_transaction_local(&self) -> bool {
        matches!(self, Self::InvalidTransaction { .. })
    }
}
