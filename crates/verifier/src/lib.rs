//! Asynchronous batch verification against external executors.
//!
//! Closed batches are handed to a [`BatchDispatcher`], which returns a
//! [`Promise`] for the executor's verdict. [`BatchVerifier`] keeps those
//! promises in batch order and surfaces results strictly in that order,
//! retrying transient failures until a request becomes stale.

mod batch_verifier;
mod error;
mod executor;
mod legacy;
mod promise;
mod types;

pub use batch_verifier::{BatchVerifier, Progress};
pub use error::VerifierError;
#[cfg(any(test, feature = "test-utils"))]
pub use executor::MockExecutorClient;
pub use executor::{ExecutorClient, ExecutorError, ExecutorPool, ExecutorVerdict};
pub use legacy::{BatchDispatcher, LegacyExecutorVerifier};
pub use promise::{Promise, PromiseCancelled};
pub use types::{ExecutorPayload, VerifierBundle, VerifierRequest, VerifierResponse};
