//! Sources of [`LogSegment`]s.
//!
//! A log stream hands out contiguous, ascending block ranges together with every `Sync` log of
//! the watched pool inside them. It owns every wait on the chain: [`LogStream::next_segment`]
//! returns only once a segment starting at the requested block is available.

use alloy::primitives::BlockNumber;

use crate::{error::IndexerError, types::LogSegment};

mod range_iterator;
mod rpc;

pub use rpc::{
    DEFAULT_BLOCK_CONFIRMATIONS, DEFAULT_MAX_BLOCK_RANGE, DEFAULT_POLL_INTERVAL, RpcLogStream,
    RpcLogStreamBuilder,
};

/// Pull-based supplier of [`LogSegment`]s.
pub trait LogStream: Send {
    /// Returns the next segment, starting at `from_block`.
    ///
    /// The segment's logs are in ascending `(block, transaction index, log index)` order.
    fn next_segment(
        &mut self,
        from_block: BlockNumber,
    ) -> impl Future<Output = Result<LogSegment, IndexerError>> + Send;
}
