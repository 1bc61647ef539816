//! Zero-knowledge resource counters for batch sealing.
//!
//! A batch can only be proven if its execution fits inside the prover's
//! fixed budget for each of seven resource dimensions. This crate tracks
//! those budgets:
//!
//! - [`Dimension`] and [`Counters`]: the budget ledger itself
//! - [`CounterCollector`]: a ledger plus the micro-operation cost model
//! - [`TransactionCounter`]: the three collectors kept per transaction
//! - [`BatchCounterCollector`]: the per-batch aggregate used to decide when
//!   a block or batch must be sealed

mod batch;
mod collector;
mod counter;
mod dimension;
mod ops;
mod transaction;

pub use batch::BatchCounterCollector;
pub use collector::{calculate_smt_levels, CombinedCounters, CounterCollector};
pub use counter::{Counter, Counters};
pub use dimension::{Dimension, MCPL, TOTAL_STEPS};
pub use ops::{ModExpCost, ModExpCostTable, ModExpWords};
pub use transaction::{CounterTransaction, TransactionCounter};
