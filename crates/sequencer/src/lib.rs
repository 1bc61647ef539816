//! Batch sequencer: assembles blocks within the circuit budget, closes
//! batches, and applies their verification results to the chain.

mod batch;
mod block;
mod clock;
mod ctx;
mod data_checker;
mod error;
mod fork;
mod handle;
mod rollback;
mod source;
mod task;

pub use batch::{BatchSequencer, BatchSignals, SealedBatch};
pub use clock::{Clock, FixedClock, SystemClock};
pub use data_checker::{BlockDataChecker, BLOCK_START_DATA_LEN};
pub use error::SequencerError;
pub use fork::{gas_limit_for_fork, prepare_fork_id};
pub use handle::{create_sequencer, SequencerHandle};
pub use rollback::{RollbackCoordinator, RollbackOutcome};
pub use source::{BlockStart, Candidate, CandidateSource, PoolSource, RecoverySource};
