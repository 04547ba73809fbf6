use std::ops::RangeInclusive;

use alloy::primitives::BlockNumber;

/// An iterator that yields ascending block ranges of at most `range_size` blocks.
#[derive(Debug, Clone)]
pub(crate) struct RangeIterator {
    current: BlockNumber,
    end: BlockNumber,
    range_size: u64,
    exhausted: bool,
}

impl RangeIterator {
    /// Yields ranges from `start` toward `end`, inclusive.
    ///
    /// # Panics
    ///
    /// Panics if `max_block_range` is 0.
    #[must_use]
    pub(crate) const fn forward(start: BlockNumber, end: BlockNumber, max_block_range: u64) -> Self {
        assert!(max_block_range >= 1, "max_block_range must be at least 1");
        Self { current: start, end, range_size: max_block_range, exhausted: start > end }
    }

    /// First block of the next range.
    pub(crate) fn next_start(&self) -> BlockNumber {
        self.current
    }

    /// Continues iteration from `block`, keeping the same end.
    pub(crate) fn reset_to(&mut self, block: BlockNumber) {
        self.current = block;
        self.exhausted = block > self.end;
    }
}

impl Iterator for RangeIterator {
    type Item = RangeInclusive<BlockNumber>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let batch_start = self.current;
        let batch_end = batch_start.saturating_add(self.range_size - 1).min(self.end);
        if batch_end == BlockNumber::MAX {
            self.exhausted = true;
        } else {
            self.current = batch_end + 1;
            self.exhausted = self.current > self.end;
        }

        Some(batch_start..=batch_end)
    }
}
