use crate::{
    counter::Counters,
    dimension::{Dimension, TOTAL_STEPS},
};

/// Merkle tree depth charged for state lookups given the executor's
/// configured maximum SMT level.
pub fn calculate_smt_levels(smt_max_level: u32) -> usize {
    (smt_max_level as usize + 2).max(32)
}

/// A resource ledger plus the SMT depth the cost model charges with.
///
/// Cloning is a cheap value copy, which is how a block rerun restores the
/// state from before the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterCollector {
    counters: Counters,
    smt_levels: usize,
}

impl CounterCollector {
    pub fn new(smt_levels: usize) -> Self {
        Self {
            counters: Counters::default(),
            smt_levels,
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn smt_levels(&self) -> usize {
        self.smt_levels
    }

    pub fn used(&self, dim: Dimension) -> i64 {
        self.counters[dim].used()
    }

    pub fn remaining(&self, dim: Dimension) -> i64 {
        self.counters[dim].remaining()
    }

    /// Charges `amount` of `dim`.
    pub fn deduct(&mut self, dim: Dimension, amount: usize) {
        self.counters[dim].deduct(amount as i64);
    }

    pub fn is_overflowed(&self) -> bool {
        self.counters.first_overflow().is_some()
    }

    /// Runs `op` `times` times against this collector.
    pub(crate) fn multi_call(&mut self, op: fn(&mut Self), times: usize) {
        for _ in 0..times {
            op(self);
        }
    }

    /// Combines the usage of several collectors into a fresh ledger.
    ///
    /// The result starts from default budgets and charges each dimension
    /// with the sum of what every input used, so the order of inputs does
    /// not matter.
    pub fn combine<'a>(collectors: impl IntoIterator<Item = &'a CounterCollector>) -> CombinedCounters {
        let mut counters = Counters::default();
        for collector in collectors {
            for c in collector.counters.iter() {
                counters[c.dimension()].deduct(c.used());
            }
        }
        CombinedCounters {
            overflow: counters.first_overflow(),
            counters,
        }
    }
}

impl Default for CounterCollector {
    fn default() -> Self {
        Self::new(calculate_smt_levels(0))
    }
}

/// Aggregated usage along with the first dimension that overflowed, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinedCounters {
    pub counters: Counters,
    pub overflow: Option<Dimension>,
}

impl CombinedCounters {
    pub fn is_overflow(&self) -> bool {
        self.overflow.is_some()
    }

    /// Share of the step budget used, in percent.
    pub fn steps_percentage(&self) -> f64 {
        self.counters[Dimension::Steps].used() as f64 * 100.0 / TOTAL_STEPS as f64
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_smt_levels() {
        assert_eq!(calculate_smt_levels(0), 32);
        assert_eq!(calculate_smt_levels(30), 32);
        assert_eq!(calculate_smt_levels(31), 33);
        assert_eq!(calculate_smt_levels(64), 66);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut a = CounterCollector::new(32);
        a.deduct(Dimension::Steps, 100);
        let snapshot = a.clone();
        a.deduct(Dimension::Steps, 50);

        assert_eq!(snapshot.used(Dimension::Steps), 100);
        assert_eq!(a.used(Dimension::Steps), 150);
    }

    #[test]
    fn test_combine_reports_overflow() {
        let mut a = CounterCollector::new(32);
        let mut b = CounterCollector::new(32);
        a.deduct(Dimension::Keccak, 2000);
        b.deduct(Dimension::Keccak, 500);

        let single = CounterCollector::combine([&a]);
        assert!(!single.is_overflow());

        let combined = CounterCollector::combine([&a, &b]);
        assert_eq!(combined.overflow, Some(Dimension::Keccak));
        assert_eq!(combined.counters[Dimension::Keccak].remaining(), 2376 - 2500);
    }

    fn collector_strategy() -> impl Strategy<Value = CounterCollector> {
        proptest::collection::vec((0usize..7, 0usize..100_000), 0..20).prop_map(|charges| {
            let mut c = CounterCollector::new(32);
            for (dim, amount) in charges {
                c.deduct(Dimension::ALL[dim], amount);
            }
            c
        })
    }

    proptest! {
        #[test]
        fn test_deduct_preserves_sum(charges in proptest::collection::vec((0usize..7, 0usize..1_000_000), 0..50)) {
            let mut c = CounterCollector::new(32);
            for (dim, amount) in charges {
                c.deduct(Dimension::ALL[dim], amount);
            }
            for counter in c.counters().iter() {
                prop_assert_eq!(counter.used() + counter.remaining(), counter.initial_amount());
            }
        }

        #[test]
        fn test_combine_is_additive(a in collector_strategy(), b in collector_strategy()) {
            let combined = CounterCollector::combine([&a, &b]);
            let reversed = CounterCollector::combine([&b, &a]);
            prop_assert_eq!(combined, reversed);
            for dim in Dimension::ALL {
                prop_assert_eq!(combined.counters[dim].used(), a.used(dim) + b.used(dim));
            }
        }
    }
}
