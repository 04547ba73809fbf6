use std::fmt;

use alloy::{
    primitives::{Address, BlockNumber, TxHash, U256},
    rpc::types::Log,
};

/// A raw chain log as delivered by the log stream.
pub type RawLog = Log;

/// A decoded `Sync` event of a liquidity pool.
///
/// Values are never mutated after decoding. A later event with the same [`NaturalKey`] replaces
/// the stored one as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolSyncEvent {
    pub address: Address,
    pub block_number: BlockNumber,
    pub transaction_index: u16,
    pub log_index: u16,
    pub transaction_hash: TxHash,
    pub reserve0: U256,
    pub reserve1: U256,
}

impl PoolSyncEvent {
    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            block_number: self.block_number,
            transaction_index: self.transaction_index,
            log_index: self.log_index,
        }
    }
}

/// Position of a log in chain history: `(block number, transaction index, log index)`.
///
/// The derived ordering is the ordering used for pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NaturalKey {
    pub block_number: BlockNumber,
    pub transaction_index: u16,
    pub log_index: u16,
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.block_number, self.transaction_index, self.log_index)
    }
}

/// A contiguous, inclusive block range and every matching log inside it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogSegment {
    pub from_block: BlockNumber,
    pub to_block: BlockNumber,
    pub logs: Vec<RawLog>,
}

impl LogSegment {
    #[must_use]
    pub fn new(from_block: BlockNumber, to_block: BlockNumber, logs: Vec<RawLog>) -> Self {
        Self { from_block, to_block, logs }
    }

    /// Number of blocks covered by the segment.
    #[must_use]
    pub fn block_count(&self) -> u64 {
        self.to_block.saturating_sub(self.from_block).saturating_add(1)
    }
}

/// Sort key of a raw log inside a segment. Pending logs sort first.
pub(crate) fn log_position(log: &RawLog) -> (Option<u64>, Option<u64>, Option<u64>) {
    (log.block_number, log.transaction_index, log.log_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_key_orders_by_block_then_transaction_then_log() {
        let key = |block_number, transaction_index, log_index| NaturalKey {
            block_number,
            transaction_index,
            log_index,
        };

        let mut keys = vec![key(2, 0, 0), key(1, 3, 1), key(1, 3, 0), key(1, 0, 9)];
        keys.sort();

        assert_eq!(keys, vec![key(1, 0, 9), key(1, 3, 0), key(1, 3, 1), key(2, 0, 0)]);
    }

    #[test]
    fn block_count_is_inclusive() {
        assert_eq!(LogSegment::new(100, 100, vec![]).block_count(), 1);
        assert_eq!(LogSegment::new(100, 149, vec![]).block_count(), 50);
    }
}
