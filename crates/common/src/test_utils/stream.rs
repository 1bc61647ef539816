use std::sync::Arc;

use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{DataStreamEncoder, DataStreamPublisher, L2Block, StateCommitment};

/// Encodes a block as `batch ++ previous_batch ++ number ++ hash`.
#[derive(Debug, Default)]
pub struct TestStreamEncoder;

impl DataStreamEncoder for TestStreamEncoder {
    fn encode(&self, block: &L2Block, batch: u64, previous_batch: u64) -> eyre::Result<Bytes> {
        let mut buf = Vec::with_capacity(56);
        buf.extend_from_slice(&batch.to_be_bytes());
        buf.extend_from_slice(&previous_batch.to_be_bytes());
        buf.extend_from_slice(&block.number().to_be_bytes());
        buf.extend_from_slice(block.hash().as_slice());
        Ok(Bytes::from(buf))
    }
}

/// Publisher that keeps everything it was handed.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<(u64, Bytes)>>>,
}

impl RecordingPublisher {
    pub fn published(&self) -> Vec<(u64, Bytes)> {
        self.published.lock().clone()
    }

    pub fn published_blocks(&self) -> Vec<u64> {
        self.published.lock().iter().map(|(n, _)| *n).collect()
    }
}

#[async_trait]
impl DataStreamPublisher for RecordingPublisher {
    async fn publish(&self, block_number: u64, entries: Bytes) -> eyre::Result<()> {
        self.published.lock().push((block_number, entries));
        Ok(())
    }
}

/// State commitment returning the block range as the witness.
#[derive(Debug, Default)]
pub struct FixedStateCommitment {
    pub root: B256,
}

#[async_trait]
impl StateCommitment for FixedStateCommitment {
    async fn witness(&self, start_block: u64, end_block: u64) -> eyre::Result<Bytes> {
        let mut buf = start_block.to_be_bytes().to_vec();
        buf.extend_from_slice(&end_block.to_be_bytes());
        Ok(Bytes::from(buf))
    }

    async fn root(&self) -> eyre::Result<B256> {
        Ok(self.root)
    }
}
