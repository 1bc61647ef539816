//! Chain types and collaborator interfaces for the batch sequencer.

mod error;
pub mod logging;
mod traits;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use error::{ExecutionError, StorageError};
#[cfg(feature = "test-utils")]
pub use traits::{
    chain::MockUnwinder,
    pool::MockTxPool,
    state::MockStateCommitment,
    stream::{MockDataStreamEncoder, MockDataStreamPublisher},
};
pub use traits::{
    chain::{ChainStore, ChainView, RecoveryStore, Unwinder},
    execution::{BlockExecutor, ExecutionOutcome},
    pool::TxPool,
    state::StateCommitment,
    stream::{DataStreamEncoder, DataStreamPublisher},
};
pub use types::{
    BlockHeader, DecodedBlock, ForkActivation, L2Block, L2Transaction, Receipt, RecoveredBatch,
    Signature, Stage, UnwindReason,
};
