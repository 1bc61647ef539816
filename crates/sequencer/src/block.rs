//! Admission of a single transaction into the open block.

use tracing::warn;
use zkseq_common::{BlockExecutor, ExecutionError, Receipt};
use zkseq_counters::{BatchCounterCollector, TransactionCounter};

use crate::{data_checker::BlockDataChecker, error::SequencerError, source::Candidate};

/// Result of trying to add a transaction to the open block.
#[derive(Debug)]
pub(crate) enum TxAttempt {
    Added(Receipt),
    /// The transaction does not fit the batch. Counters and executor state
    /// may include it and must be restored from the block snapshot.
    Overflow,
    /// The executor refused the transaction. Counters are left as they were.
    Rejected(ExecutionError),
}

/// Charges `candidate` to the batch and executes it.
///
/// With `ignore_overflow` the transaction is kept even if it overflows,
/// which is how replayed L1 data is reproduced.
pub(crate) fn attempt_add_transaction<X>(
    executor: &mut X,
    counters: &mut BatchCounterCollector,
    data_checker: &mut BlockDataChecker,
    candidate: &Candidate,
    ignore_overflow: bool,
) -> Result<TxAttempt, SequencerError>
where
    X: BlockExecutor + ?Sized,
{
    let tx = &candidate.tx;
    let hash = tx.hash();

    let mut data_after = *data_checker;
    let data_overflow = data_after.add_transaction_data(&tx.raw);
    if data_overflow && !ignore_overflow {
        return Ok(TxAttempt::Overflow);
    }

    let mut tx_counters = TransactionCounter::new(tx, counters.smt_levels());
    let rlp_overflow = counters.add_new_transaction_counters(tx_counters.clone());
    if rlp_overflow && !ignore_overflow {
        return Ok(TxAttempt::Overflow);
    }

    let outcome = match executor.execute_transaction(
        tx,
        candidate.effective_gas_percentage,
        tx_counters.execution_mut(),
    ) {
        Ok(outcome) => outcome,
        Err(e) if e.is_transaction_local() => {
            counters.remove_last_transaction();
            return Ok(TxAttempt::Rejected(e));
        }
        Err(e) => return Err(e.into()),
    };

    tx_counters.process_tx(outcome.is_deploy, outcome.bytecode_len);
    counters.update_last_transaction(tx_counters);
    let overflow = rlp_overflow || counters.check_for_overflow();
    if overflow && !ignore_overflow {
        return Ok(TxAttempt::Overflow);
    }
    if overflow || data_overflow {
        warn!(tx_hash = %hash, "replayed transaction overflows the batch, keeping it");
    }

    *data_checker = data_after;
    Ok(TxAttempt::Added(Receipt {
        tx_hash: hash,
        success: outcome.success,
        gas_used: outcome.gas_used,
    }))
}
