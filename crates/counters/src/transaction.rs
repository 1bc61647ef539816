use alloy_primitives::U256;

use crate::{collector::CounterCollector, dimension::Dimension};

/// Transaction fields the RLP decoding cost depends on.
pub trait CounterTransaction {
    /// Length of the full RLP encoding.
    fn encoded_len(&self) -> usize;

    /// Length of the call data.
    fn data_len(&self) -> usize;

    fn nonce(&self) -> u64;

    fn gas_price(&self) -> U256;

    fn gas_limit(&self) -> u64;

    fn value(&self) -> U256;

    fn chain_id(&self) -> u64;

    /// Returns `(v, r, s)` as they appear in the encoding.
    fn signature(&self) -> (U256, U256, U256);

    /// EIP-155 replay protected.
    fn is_protected(&self) -> bool;
}

/// Minimal number of bytes of the big-endian encoding of `value`. Zero still
/// takes one byte.
fn byte_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

fn low_u64(value: U256) -> u64 {
    value.as_limbs()[0]
}

/// Counters kept for a single transaction.
///
/// The three collectors are charged in separate phases: `rlp` when the
/// transaction is decoded, `execution` by the EVM while it runs and
/// `processing` once its outcome is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionCounter {
    rlp: CounterCollector,
    execution: CounterCollector,
    processing: CounterCollector,
}

impl TransactionCounter {
    /// Creates the counters for `tx` and charges its decoding cost.
    pub fn new(tx: &impl CounterTransaction, smt_levels: usize) -> Self {
        let mut counter = Self {
            rlp: CounterCollector::new(smt_levels),
            execution: CounterCollector::new(smt_levels),
            processing: CounterCollector::new(smt_levels),
        };
        counter.calculate_rlp(tx);
        counter
    }

    pub fn rlp(&self) -> &CounterCollector {
        &self.rlp
    }

    pub fn execution(&self) -> &CounterCollector {
        &self.execution
    }

    /// Collector the EVM charges while executing the transaction.
    pub fn execution_mut(&mut self) -> &mut CounterCollector {
        &mut self.execution
    }

    pub fn processing(&self) -> &CounterCollector {
        &self.processing
    }

    pub(crate) fn collectors(&self) -> [&CounterCollector; 3] {
        [&self.rlp, &self.execution, &self.processing]
    }

    fn calculate_rlp(&mut self, tx: &impl CounterTransaction) {
        let rlp_len = tx.encoded_len();
        let data_len = tx.data_len();
        let c = &mut self.rlp;

        c.deduct(Dimension::Steps, 250);
        c.deduct(Dimension::Binary, 2);
        c.deduct(Dimension::Keccak, (rlp_len + 1).div_ceil(136));
        let chunks = (rlp_len + 1).div_ceil(56) + 3;
        c.deduct(Dimension::Poseidon, chunks);
        c.deduct(Dimension::Padding, chunks);
        c.multi_call(CounterCollector::add_batch_hash_data, 21);

        c.deduct(Dimension::Steps, 42);
        c.get_len_bytes(3);
        c.get_len_bytes(byte_len(low_u64(tx.gas_price())));
        c.get_len_bytes(byte_len(tx.gas_limit()));
        c.get_len_bytes(byte_len(low_u64(tx.value())));
        if data_len >= 56 {
            c.get_len_bytes(data_len);
        }
        c.get_len_bytes(byte_len(tx.chain_id()));
        c.get_len_bytes(byte_len(tx.nonce()));
        c.div_arith();

        c.multi_call(CounterCollector::add_hash_tx, 9 + data_len / 32);
        c.multi_call(CounterCollector::add_l2_hash_tx, 8 + data_len / 32);
        c.multi_call(CounterCollector::add_batch_hash_byte_by_byte, data_len);
        c.shl_arith();

        let (v, r, s) = tx.signature();
        let decoded_v = if tx.is_protected() {
            let offset = U256::from(tx.chain_id()) * U256::from(2u8) + U256::from(35u8);
            v.wrapping_sub(offset).wrapping_add(U256::from(27u8))
        } else {
            v
        };
        c.ec_recover(decoded_v, r, s, false);
    }

    /// Charges the cost of closing out an executed transaction.
    ///
    /// `bytecode_len` is the returned init code length for deployments and
    /// the callee code length otherwise.
    pub fn process_tx(&mut self, is_deploy: bool, bytecode_len: usize) {
        let c = &mut self.processing;
        let smt = c.smt_levels();

        c.deduct(Dimension::Steps, 300);
        c.deduct(Dimension::Binary, 18);
        c.deduct(Dimension::Poseidon, 14 * smt);
        c.deduct(Dimension::Padding, 5);
        c.deduct(Dimension::Arithmetic, 2);
        c.deduct(Dimension::Keccak, 1);
        c.multi_call(CounterCollector::is_cold_address, 2);
        c.multi_call(CounterCollector::add_arith, 3);
        c.sub_arith();
        c.div_arith();
        c.multi_call(CounterCollector::mul_arith, 4);
        c.fill_block_info_tree_with_tx_receipt();
        c.process_contract_call(bytecode_len, is_deploy, false, false);
    }
}
