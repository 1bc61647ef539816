use std::fmt;

use serde::{Deserialize, Serialize};

/// Step budget of a single batch proof. Every other budget derives from it.
pub const TOTAL_STEPS: i64 = 1 << 23;

/// Poseidon permutations charged per Merkle-tree path level.
pub const MCPL: usize = 23;

/// One of the seven resource dimensions a batch proof is bounded by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dimension {
    /// Main state machine steps.
    Steps,
    /// Arithmetic state machine rows.
    Arithmetic,
    /// Binary state machine rows.
    Binary,
    /// Memory alignment rows.
    MemAlign,
    /// Keccak-f permutations.
    Keccak,
    /// Padding rows for Poseidon hashing.
    Padding,
    /// Poseidon permutations.
    Poseidon,
}

impl Dimension {
    /// All dimensions, in ledger order.
    pub const ALL: [Dimension; 7] = [
        Dimension::Steps,
        Dimension::Arithmetic,
        Dimension::Binary,
        Dimension::MemAlign,
        Dimension::Keccak,
        Dimension::Padding,
        Dimension::Poseidon,
    ];

    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// Short key used in maps and log lines.
    pub const fn key(self) -> &'static str {
        match self {
            Dimension::Steps => "S",
            Dimension::Arithmetic => "A",
            Dimension::Binary => "B",
            Dimension::MemAlign => "M",
            Dimension::Keccak => "K",
            Dimension::Padding => "D",
            Dimension::Poseidon => "P",
        }
    }

    /// Human readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Dimension::Steps => "totalSteps",
            Dimension::Arithmetic => "arith",
            Dimension::Binary => "binary",
            Dimension::MemAlign => "memAlign",
            Dimension::Keccak => "keccaks",
            Dimension::Padding => "padding",
            Dimension::Poseidon => "poseidon",
        }
    }

    /// Budget a fresh ledger starts with for this dimension.
    pub const fn default_budget(self) -> i64 {
        match self {
            Dimension::Steps => TOTAL_STEPS,
            Dimension::Arithmetic => TOTAL_STEPS / 32,
            Dimension::Binary => TOTAL_STEPS / 16,
            Dimension::MemAlign => TOTAL_STEPS / 32,
            Dimension::Keccak => (TOTAL_STEPS / 155_286) * 44,
            Dimension::Padding => TOTAL_STEPS / 56,
            Dimension::Poseidon => TOTAL_STEPS / 30,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budgets() {
        assert_eq!(Dimension::Steps.default_budget(), 8_388_608);
        assert_eq!(Dimension::Arithmetic.default_budget(), 262_144);
        assert_eq!(Dimension::Binary.default_budget(), 524_288);
        assert_eq!(Dimension::MemAlign.default_budget(), 262_144);
        assert_eq!(Dimension::Keccak.default_budget(), 2_376);
        assert_eq!(Dimension::Padding.default_budget(), 149_796);
        assert_eq!(Dimension::Poseidon.default_budget(), 279_620);
    }

    #[test]
    fn test_index_matches_ledger_order() {
        for (i, dim) in Dimension::ALL.iter().enumerate() {
            assert_eq!(dim.index(), i);
        }
    }
}
