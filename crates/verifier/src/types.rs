use std::{collections::BTreeMap, time::Duration};

use tokio::time::Instant;
use zkseq_common::{Address, Bytes, B256};

/// A closed batch awaiting executor verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierRequest {
    pub batch_number: u64,
    /// Last block of the batch.
    pub block_number: u64,
    pub fork_id: u64,
    /// State root after the last block.
    pub state_root: B256,
    /// Used amount per counter dimension, keyed by short key.
    pub counters: BTreeMap<String, i64>,
    /// Number of times the request was re-dispatched.
    pub check_count: u32,
    pub created_at: Instant,
}

impl VerifierRequest {
    pub fn new(
        batch_number: u64,
        block_number: u64,
        fork_id: u64,
        state_root: B256,
        counters: BTreeMap<String, i64>,
    ) -> Self {
        Self {
            batch_number,
            block_number,
            fork_id,
            state_root,
            counters,
            check_count: 0,
            created_at: Instant::now(),
        }
    }

    /// Whether the request is older than `timeout`.
    pub fn is_overdue(&self, timeout: Duration) -> bool {
        self.created_at.elapsed() > timeout
    }

    pub fn increment_check_count(&mut self) {
        self.check_count = self.check_count.saturating_add(1);
    }
}

/// Input handed to an executor for stateless re-execution of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorPayload {
    pub witness: Bytes,
    /// Data stream entries of every block in the batch.
    pub data_stream: Bytes,
    pub coinbase: Address,
    pub old_acc_input_hash: B256,
    pub l1_info_root: Option<B256>,
    pub timestamp_limit: u64,
    pub forced_blockhash_l1: Bytes,
    pub context_id: String,
    pub l1_info_tree_min_timestamps: BTreeMap<u64, u64>,
}

/// Executor verdict for a [`VerifierRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierResponse {
    pub batch_number: u64,
    pub block_number: u64,
    pub valid: bool,
    pub witness: Bytes,
    pub executor_payload: Option<ExecutorPayload>,
    /// Why the executor rejected the batch, if it did.
    pub error: Option<String>,
}

impl VerifierResponse {
    /// Accepting response used when no executor is configured.
    pub fn trusted(request: &VerifierRequest) -> Self {
        Self {
            batch_number: request.batch_number,
            block_number: request.block_number,
            valid: true,
            witness: Bytes::new(),
            executor_payload: None,
            error: None,
        }
    }
}

/// A completed verification together with the blocks it covered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierBundle {
    pub request: VerifierRequest,
    pub response: VerifierResponse,
    /// Blocks of the batch, ascending.
    pub block_numbers: Vec<u64>,
}

impl VerifierBundle {
    pub fn is_valid(&self) -> bool {
        self.response.valid
    }

    pub fn first_block(&self) -> Option<u64> {
        self.block_numbers.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::advance;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_request_overdue() {
        let mut request = VerifierRequest::new(3, 10, 9, B256::ZERO, BTreeMap::new());
        let timeout = Duration::from_secs(60);
        assert!(!request.is_overdue(timeout));

        advance(Duration::from_secs(61)).await;
        assert!(request.is_overdue(timeout));

        request.increment_check_count();
        assert_eq!(request.check_count, 1);
    }

    #[test]
    fn test_trusted_response() {
        let request = VerifierRequest::new(3, 10, 9, B256::ZERO, BTreeMap::new());
        let response = VerifierResponse::trusted(&request);
        assert!(response.valid);
        assert_eq!(response.batch_number, 3);
        assert_eq!(response.block_number, 10);
        assert!(response.executor_payload.is_none());
    }
}
