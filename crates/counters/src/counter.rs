use std::{
    collections::BTreeMap,
    fmt,
    ops::{Index, IndexMut},
};

use crate::dimension::Dimension;

/// Budget accounting for a single dimension.
///
/// `used + remaining == initial_amount` holds after every deduction. The
/// remaining amount goes negative once the budget is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    dimension: Dimension,
    initial_amount: i64,
    used: i64,
    remaining: i64,
}

impl Counter {
    pub fn new(dimension: Dimension, initial_amount: i64) -> Self {
        Self {
            dimension,
            initial_amount,
            used: 0,
            remaining: initial_amount,
        }
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn initial_amount(&self) -> i64 {
        self.initial_amount
    }

    pub fn used(&self) -> i64 {
        self.used
    }

    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    pub fn is_overflowed(&self) -> bool {
        self.remaining < 0
    }

    pub(crate) fn deduct(&mut self, amount: i64) {
        self.used += amount;
        self.remaining -= amount;
    }
}

/// One [`Counter`] per [`Dimension`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counters([Counter; 7]);

impl Counters {
    /// Ledger with every dimension at its default budget.
    pub fn with_default_budgets() -> Self {
        Self(Dimension::ALL.map(|d| Counter::new(d, d.default_budget())))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Counter> {
        self.0.iter()
    }

    /// First dimension, in ledger order, whose remaining amount is negative.
    pub fn first_overflow(&self) -> Option<Dimension> {
        self.0.iter().find(|c| c.is_overflowed()).map(|c| c.dimension)
    }

    /// Used amount per dimension keyed by the short dimension key.
    pub fn used_map(&self) -> BTreeMap<String, i64> {
        self.0
            .iter()
            .map(|c| (c.dimension.key().to_owned(), c.used))
            .collect()
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::with_default_budgets()
    }
}

impl Index<Dimension> for Counters {
    type Output = Counter;

    fn index(&self, dim: Dimension) -> &Counter {
        &self.0[dim.index()]
    }
}

impl IndexMut<Dimension> for Counters {
    fn index_mut(&mut self, dim: Dimension) -> &mut Counter {
        &mut self.0[dim.index()]
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "[{}: {}]", c.dimension.key(), c.used)?;
        }
        Ok(())
    }
}
