/// Batch L2 data size of the change-L2-block marker that opens every block.
pub const BLOCK_START_DATA_LEN: usize = 65;

/// Tracks the batch L2 data size against the rollup contract limit.
///
/// Additions that would exceed the limit are refused and leave the checker
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDataChecker {
    limit: usize,
    used: usize,
}

impl BlockDataChecker {
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Accounts for a block start. Returns `true` if the limit would be
    /// exceeded.
    pub fn add_block_start_data(&mut self) -> bool {
        self.add(BLOCK_START_DATA_LEN)
    }

    /// Accounts for an encoded transaction. Returns `true` if the limit would
    /// be exceeded.
    pub fn add_transaction_data(&mut self, tx_l2_data: &[u8]) -> bool {
        self.add(tx_l2_data.len())
    }

    fn add(&mut self, len: usize) -> bool {
        match self.used.checked_add(len) {
            Some(total) if total <= self.limit => {
                self.used = total;
                false
            }
            _ => true,
        }
    }
}
