//! Chain data types shared by the sequencer and verifier.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use zkseq_counters::CounterTransaction;

/// Signature values as carried by a legacy transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub v: U256,
    pub r: U256,
    pub s: U256,
}

/// An L2 transaction as handed over by the pool or decoded from L1 data.
///
/// `raw` is the batch L2 data encoding of the transaction. Its hash is the
/// transaction hash and its length is what the batch data limit is charged
/// with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2Transaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
    pub chain_id: Option<u64>,
    pub signature: Signature,
    pub raw: Bytes,
}

impl L2Transaction {
    pub fn hash(&self) -> B256 {
        keccak256(&self.raw)
    }

    pub fn is_deploy(&self) -> bool {
        self.to.is_none()
    }
}

impl CounterTransaction for L2Transaction {
    fn encoded_len(&self) -> usize {
        self.raw.len()
    }

    fn data_len(&self) -> usize {
        self.input.len()
    }

    fn nonce(&self) -> u64 {
        self.nonce
    }

    fn gas_price(&self) -> U256 {
        self.gas_price
    }

    fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    fn value(&self) -> U256 {
        self.value
    }

    fn chain_id(&self) -> u64 {
        self.chain_id.unwrap_or_default()
    }

    fn signature(&self) -> (U256, U256, U256) {
        (self.signature.v, self.signature.r, self.signature.s)
    }

    fn is_protected(&self) -> bool {
        self.chain_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    pub parent_hash: B256,
    pub coinbase: Address,
    pub timestamp: u64,
    pub gas_limit: u64,
    pub state_root: B256,
}

impl BlockHeader {
    pub fn hash(&self) -> B256 {
        let mut buf = Vec::with_capacity(8 + 32 + 20 + 8 + 8 + 32);
        buf.extend_from_slice(&self.number.to_be_bytes());
        buf.extend_from_slice(self.parent_hash.as_slice());
        buf.extend_from_slice(self.coinbase.as_slice());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.gas_limit.to_be_bytes());
        buf.extend_from_slice(self.state_root.as_slice());
        keccak256(buf)
    }
}

/// Outcome of a transaction included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: B256,
    pub success: bool,
    pub gas_used: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2Block {
    pub header: BlockHeader,
    pub transactions: Vec<L2Transaction>,
    pub receipts: Vec<Receipt>,
    pub effective_gas_percentages: Vec<u8>,
}

impl L2Block {
    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn hash(&self) -> B256 {
        self.header.hash()
    }
}

/// One block of a batch decoded from L1 data, replayed during L1 recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedBlock {
    pub delta_timestamp: u32,
    pub l1_info_tree_index: u32,
    pub transactions: Vec<L2Transaction>,
    pub effective_gas_percentages: Vec<u8>,
}

/// Persisted L1 data of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveredBatch {
    pub blocks: Vec<DecodedBlock>,
    pub coinbase: Address,
    /// Whether more batches remain to be recovered after this one.
    pub work_remaining: bool,
}

/// Persisted progress markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Highest executed block.
    Execution,
    /// Highest batch blocks were sequenced into.
    HighestSeenBatchNumber,
    /// Highest batch confirmed by an executor.
    SequenceExecutorVerify,
}

/// Fork activated starting at the batch after `batch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkActivation {
    pub fork_id: u64,
    pub batch: u64,
}

/// Why the chain is being unwound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnwindReason {
    /// An executor rejected the batch containing the unwound block.
    VerificationFailed { batch: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> BlockHeader {
        BlockHeader {
            number: 7,
            parent_hash: B256::repeat_byte(1),
            coinbase: Address::repeat_byte(2),
            timestamp: 1_700_000_000,
            gas_limit: u64::MAX,
            state_root: B256::repeat_byte(3),
        }
    }

    #[test]
    fn test_header_hash_covers_fields() {
        let a = header();
        let mut b = header();
        assert_eq!(a.hash(), b.hash());
        b.timestamp += 1;
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_transaction_counter_view() {
        let tx = L2Transaction {
            nonce: 3,
            gas_price: U256::from(5u8),
            gas_limit: 21_000,
            to: None,
            value: U256::ZERO,
            input: Bytes::from(vec![0u8; 40]),
            chain_id: Some(1001),
            signature: Signature {
                v: U256::from(2037u32),
                r: U256::from(1u8),
                s: U256::from(1u8),
            },
            raw: Bytes::from(vec![0xaa; 120]),
        };
        assert!(tx.is_deploy());
        assert!(tx.is_protected());
        assert_eq!(tx.encoded_len(), 120);
        assert_eq!(tx.data_len(), 40);
        assert_eq!(tx.hash(), keccak256([0xaa; 120]));
    }
}
