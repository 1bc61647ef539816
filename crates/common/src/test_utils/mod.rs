//! In-memory collaborators for tests.

mod executor;
mod pool;
mod store;
mod stream;

use alloy_primitives::{Address, Bytes, B256, U256};

pub use executor::TestBlockExecutor;
pub use pool::InMemoryTxPool;
pub use store::{InMemoryChainStore, InMemoryChainView};
pub use stream::{FixedStateCommitment, RecordingPublisher, TestStreamEncoder};

use crate::{BlockHeader, L2Block, L2Transaction, Signature};

/// Plain value transfer whose encoding is `raw_len` bytes long.
pub fn test_tx_with_size(nonce: u64, raw_len: usize) -> L2Transaction {
    let mut raw = vec![0u8; raw_len.max(8)];
    raw[..8].copy_from_slice(&nonce.to_be_bytes());
    L2Transaction {
        nonce,
        gas_price: U256::from(1_000_000_000u64),
        gas_limit: 21_000,
        to: Some(Address::repeat_byte(0x11)),
        value: U256::from(1u8),
        input: Bytes::new(),
        chain_id: None,
        signature: Signature {
            v: U256::from(27u8),
            r: U256::from(1u8),
            s: U256::from(1u8),
        },
        raw: Bytes::from(raw),
    }
}

pub fn test_tx(nonce: u64) -> L2Transaction {
    test_tx_with_size(nonce, 110)
}

pub fn empty_block(number: u64, timestamp: u64) -> L2Block {
    L2Block {
        header: BlockHeader {
            number,
            parent_hash: B256::ZERO,
            coinbase: Address::ZERO,
            timestamp,
            gas_limit: u64::MAX,
            state_root: B256::with_last_byte(number as u8),
        },
        transactions: Vec::new(),
        receipts: Vec::new(),
        effective_gas_percentages: Vec::new(),
    }
}
