//! Cost model of the prover's micro-operations.
//!
//! Each method charges the collector with what one invocation of the
//! corresponding ROM routine consumes. Composite routines call the
//! primitives they are built from.

use alloy_primitives::U256;

use crate::{
    collector::CounterCollector,
    dimension::{
        Dimension::{Arithmetic, Binary, Keccak, MemAlign, Padding, Poseidon, Steps},
        MCPL,
    },
};

/// Order of the secp256k1 group.
const FNEC: U256 = U256::from_limbs([
    0xBFD2_5E8C_D036_4141,
    0xBAAE_DCE6_AF48_A03B,
    0xFFFF_FFFF_FFFF_FFFE,
    0xFFFF_FFFF_FFFF_FFFF,
]);

/// Word-rounded operand sizes of a modular exponentiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModExpWords {
    pub base: usize,
    pub modulus: usize,
    pub exponent: usize,
}

/// Counters consumed by one modular exponentiation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModExpCost {
    pub steps: usize,
    pub binary: usize,
    pub arith: usize,
}

/// The prover's cost table for the modular exponentiation routine.
///
/// Closures with the same shape implement it.
pub trait ModExpCostTable {
    fn cost(
        &self,
        words: ModExpWords,
        base: &[u8],
        exponent: &[u8],
        modulus: &[u8],
    ) -> ModExpCost;
}

impl<F> ModExpCostTable for F
where
    F: Fn(ModExpWords, &[u8], &[u8], &[u8]) -> ModExpCost,
{
    fn cost(
        &self,
        words: ModExpWords,
        base: &[u8],
        exponent: &[u8],
        modulus: &[u8],
    ) -> ModExpCost {
        self(words, base, exponent, modulus)
    }
}

impl CounterCollector {
    pub fn offset_util(&mut self) {
        self.deduct(Steps, 10);
        self.deduct(Binary, 1);
    }

    pub fn shr_arith(&mut self) {
        self.deduct(Steps, 50);
        self.deduct(Binary, 2);
        self.deduct(Arithmetic, 1);
        self.div_arith();
    }

    pub fn shl_arith(&mut self) {
        self.deduct(Steps, 100);
        self.deduct(Binary, 4);
        self.deduct(Arithmetic, 2);
    }

    pub fn div_arith(&mut self) {
        self.deduct(Steps, 50);
        self.deduct(Binary, 3);
        self.deduct(Arithmetic, 1);
    }

    pub fn add_arith(&mut self) {
        self.deduct(Steps, 10);
        self.deduct(Binary, 1);
    }

    pub fn sub_arith(&mut self) {
        self.deduct(Steps, 10);
        self.deduct(Binary, 1);
    }

    pub fn mul_arith(&mut self) {
        self.deduct(Steps, 50);
        self.deduct(Binary, 1);
        self.deduct(Arithmetic, 1);
    }

    pub fn inv_fn_ec(&mut self) {
        self.deduct(Steps, 12);
        self.deduct(Binary, 2);
        self.deduct(Arithmetic, 2);
    }

    pub fn mask_address(&mut self) {
        self.deduct(Steps, 6);
        self.deduct(Binary, 1);
    }

    pub fn fail_assert(&mut self) {
        self.deduct(Steps, 2);
    }

    /// Unaligned memory load of up to 32 bytes.
    pub fn m_load_x(&mut self) {
        self.deduct(Steps, 40);
        self.deduct(Binary, 2);
        self.deduct(MemAlign, 1);
        self.offset_util();
        self.shr_arith();
        self.shl_arith();
    }

    /// Aligned memory load of a full word. Costs the same as [`Self::m_load_x`].
    pub fn m_load_32(&mut self) {
        self.m_load_x();
    }

    /// Common prologue of every opcode. Create opcodes also read the init code.
    pub fn op_code(&mut self, is_create: bool) {
        self.deduct(Steps, 12);
        if is_create {
            self.m_load_x();
            self.shr_arith();
        }
    }

    pub fn op_add(&mut self, is_create: bool) {
        self.op_code(is_create);
        self.deduct(Steps, 10);
        self.deduct(Binary, 1);
    }

    pub fn add_batch_hash_data(&mut self) {
        self.deduct(Steps, 10);
    }

    pub fn add_hash_tx(&mut self) {
        self.deduct(Steps, 10);
    }

    pub fn add_l2_hash_tx(&mut self) {
        self.deduct(Steps, 10);
    }

    pub fn add_batch_hash_byte_by_byte(&mut self) {
        self.deduct(Steps, 25);
        self.deduct(Binary, 1);
        self.shr_arith();
        self.add_batch_hash_data();
    }

    /// Decoding a big-endian length prefix of `len` bytes.
    pub fn get_len_bytes(&mut self, len: usize) {
        self.deduct(Steps, len * 7 + 12);
        self.deduct(Binary, len);
        self.multi_call(Self::shr_arith, len);
    }

    /// Signature recovery. Outside the precompile `r` and `s` are bounded by
    /// half the group order, in the precompile by the order minus one.
    ///
    /// The zero and `v` checks only look at the low 64 bits. Every signature
    /// that passes is charged the recoverable-point cost.
    pub fn ec_recover(&mut self, v: U256, r: U256, s: U256, is_precompiled: bool) {
        let upper = if is_precompiled {
            FNEC - U256::from(1u8)
        } else {
            FNEC >> 1
        };

        let low = |x: U256| x.as_limbs()[0];
        let bad_v = low(v) != 27 && low(v) != 28;
        if low(r) == 0 || r > upper || low(s) == 0 || s > upper || bad_v {
            self.deduct(Steps, 45);
            self.deduct(Arithmetic, 2);
            self.deduct(Binary, 8);
            return;
        }

        self.deduct(Steps, 6294);
        self.deduct(Arithmetic, 528);
        self.deduct(Binary, 523);
        self.deduct(Keccak, 1);
    }

    pub fn ec_add(&mut self) {
        self.deduct(Steps, 323);
        self.deduct(Binary, 33);
        self.deduct(Arithmetic, 40);
    }

    pub fn ec_mul(&mut self) {
        self.deduct(Steps, 162_890);
        self.deduct(Binary, 16_395);
        self.deduct(Arithmetic, 19_161);
    }

    pub fn ec_pairing(&mut self, inputs: usize) {
        self.deduct(Steps, 16 + inputs * 184_017 + 171_253);
        self.deduct(Binary, inputs * 3_986 + 650);
        self.deduct(Arithmetic, inputs * 13_694 + 15_411);
    }

    /// Modular exponentiation precompile. Operand lengths are in bytes and
    /// rounded up to 256-bit words before `table` is consulted.
    #[expect(clippy::too_many_arguments, reason = "mirrors the ROM routine")]
    pub fn mod_exp(
        &mut self,
        table: &impl ModExpCostTable,
        b_len: usize,
        m_len: usize,
        e_len: usize,
        base: &[u8],
        exponent: &[u8],
        modulus: &[u8],
    ) {
        let words = ModExpWords {
            base: b_len.div_ceil(32),
            modulus: m_len.div_ceil(32),
            exponent: e_len.div_ceil(32),
        };
        let cost = table.cost(words, base, exponent, modulus);
        self.deduct(Steps, cost.steps);
        self.deduct(Binary, cost.binary);
        self.deduct(Arithmetic, cost.arith);
    }

    /// Closing a block writes its hash and root into the block info tree.
    pub fn consolidate_block(&mut self) {
        self.deduct(Steps, 20);
        self.deduct(Binary, 2);
        self.deduct(Poseidon, 2 * MCPL);
    }

    pub fn finish_batch_processing(&mut self) {
        self.deduct(Steps, 200);
        self.deduct(Keccak, 2);
        self.deduct(Poseidon, self.smt_levels());
        self.deduct(Binary, 1);
    }

    pub fn is_cold_address(&mut self) {
        self.deduct(Steps, 100);
        self.deduct(Binary, 3);
        self.deduct(Poseidon, 2 * MCPL);
    }

    pub fn fill_block_info_tree_with_tx_receipt(&mut self) {
        self.deduct(Steps, 20);
        self.deduct(Poseidon, 3 * self.smt_levels());
    }

    pub fn move_balances(&mut self) {
        self.deduct(Steps, 25);
        self.deduct(Binary, 5);
        self.deduct(Poseidon, 4 * self.smt_levels());
    }

    pub fn check_bytecode_starts_ef(&mut self) {
        self.deduct(Steps, 20);
        self.m_load_x();
        self.shr_arith();
    }

    fn hash_poseidon_linear_from_memory_loop(&mut self) {
        self.deduct(Steps, 8);
        self.m_load_32();
    }

    pub fn hash_poseidon_linear_from_memory(&mut self, memory_size: usize) {
        self.deduct(Steps, 50);
        self.deduct(Binary, 2);
        self.deduct(Poseidon, (memory_size + 1) / 56);
        self.deduct(Padding, (memory_size + 1) / 56);
        self.div_arith();
        self.multi_call(Self::hash_poseidon_linear_from_memory_loop, memory_size / 32);
        self.m_load_x();
        self.shr_arith();
    }

    /// Entering a call frame. `bytecode_len` is the length of the code that
    /// gets hashed: init code for deployments, callee code otherwise.
    pub fn process_contract_call(
        &mut self,
        bytecode_len: usize,
        is_deploy: bool,
        is_create: bool,
        is_create2: bool,
    ) {
        let smt = self.smt_levels();
        self.deduct(Steps, 40);
        self.deduct(Binary, 5);
        self.deduct(Poseidon, 1);
        self.deduct(Padding, 1);
        self.deduct(Poseidon, 2 * smt);
        self.move_balances();

        if is_deploy || is_create || is_create2 {
            self.deduct(Steps, 15);
            self.deduct(Binary, 2);
            self.deduct(Poseidon, 2 * smt);
            self.check_bytecode_starts_ef();
            self.hash_poseidon_linear_from_memory(bytecode_len);
            if is_create {
                self.deduct(Steps, 40);
                self.deduct(Keccak, 1);
            } else if is_create2 {
                self.deduct(Steps, 40);
                self.div_arith();
                self.deduct(Keccak, (bytecode_len + 1).div_ceil(136) + 1);
                self.multi_call(Self::m_load_32, bytecode_len / 32);
                self.m_load_x();
                self.shr_arith();
                self.deduct(Keccak, 1);
                self.mask_address();
            }
        } else {
            let chunks = (bytecode_len + 1).div_ceil(56);
            self.deduct(Poseidon, chunks);
            self.deduct(Padding, chunks);
            if bytecode_len >= 56 {
                self.div_arith();
            }
        }
    }

    pub fn setup_new_block_info_tree(&mut self) {
        self.deduct(Steps, 40);
        self.deduct(Binary, 7);
        self.deduct(Poseidon, 6 * MCPL);
    }

    pub fn verify_merkle_proof(&mut self) {
        self.deduct(Steps, 250);
        self.deduct(Keccak, 33);
    }

    /// Opening a new L2 block inside the batch.
    pub fn process_change_l2_block(&mut self, verify_merkle_proof: bool) {
        let smt = self.smt_levels();
        self.deduct(Steps, 70);
        self.deduct(Binary, 8);
        self.deduct(Poseidon, 6 * smt);
        self.deduct(Keccak, 2);
        self.consolidate_block();
        self.setup_new_block_info_tree();
        if verify_merkle_proof {
            self.verify_merkle_proof();
        }
    }

    pub fn decode_change_l2_block_tx(&mut self) {
        self.deduct(Steps, 20);
        self.multi_call(Self::add_batch_hash_data, 3);
    }
}
