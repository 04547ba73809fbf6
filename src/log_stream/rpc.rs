use std::{ops::RangeInclusive, time::Duration};

use alloy::{
    network::{Ethereum, Network},
    primitives::{Address, BlockNumber},
    rpc::types::Filter,
};
use tokio::time::sleep;

use crate::{
    codec::sync_topic,
    error::IndexerError,
    log_stream::{LogStream, range_iterator::RangeIterator},
    robust_provider::RobustProvider,
    types::{LogSegment, log_position},
};

/// Default number of blocks kept between the chain head and the newest ingested block.
pub const DEFAULT_BLOCK_CONFIRMATIONS: u64 = 15;
/// Default maximum number of blocks per segment.
pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 5000;
/// Default wait between two head polls while the stream is caught up.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Builder for [`RpcLogStream`].
#[derive(Clone, Debug)]
pub struct RpcLogStreamBuilder {
    pool_address: Address,
    block_confirmations: u64,
    max_block_range: u64,
    poll_interval: Duration,
}

impl RpcLogStreamBuilder {
    /// Creates a builder watching the `Sync` logs of `pool_address`.
    #[must_use]
    pub fn new(pool_address: Address) -> Self {
        Self {
            pool_address,
            block_confirmations: DEFAULT_BLOCK_CONFIRMATIONS,
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets how far behind the chain head segments end.
    #[must_use]
    pub fn block_confirmations(mut self, block_confirmations: u64) -> Self {
        self.block_confirmations = block_confirmations;
        self
    }

    /// Sets the maximum number of blocks per segment.
    ///
    /// Must be greater than 0.
    #[must_use]
    pub fn max_block_range(mut self, max_block_range: u64) -> Self {
        self.max_block_range = max_block_range;
        self
    }

    /// Sets the wait between two head polls once the stream has caught up.
    #[must_use]
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Attaches the stream to a built provider, keeping its fallbacks and retry settings.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::InvalidMaxBlockRange`] if `max_block_range` is 0.
    pub fn connect<N: Network>(
        self,
        provider: RobustProvider<N>,
    ) -> Result<RpcLogStream<N>, IndexerError> {
        if self.max_block_range == 0 {
            return Err(IndexerError::InvalidMaxBlockRange);
        }
        Ok(RpcLogStream {
            provider,
            filter: Filter::new().address(self.pool_address).event_signature(sync_topic()),
            block_confirmations: self.block_confirmations,
            max_block_range: self.max_block_range,
            poll_interval: self.poll_interval,
            planned: None,
        })
    }
}

/// [`LogStream`] backed by `eth_getLogs` on a [`RobustProvider`].
///
/// Segments end at most `max_block_range - 1` blocks after their start and never past the
/// confirmed head (`latest - block_confirmations`). While catching up, the ranges up to the last
/// observed confirmed head are planned once, so the head is only polled again when they run out.
#[derive(Debug)]
pub struct RpcLogStream<N: Network = Ethereum> {
    provider: RobustProvider<N>,
    filter: Filter,
    block_confirmations: u64,
    max_block_range: u64,
    poll_interval: Duration,
    planned: Option<RangeIterator>,
}

impl<N: Network> RpcLogStream<N> {
    /// Returns the next range to query, waiting for the confirmed head to reach `from_block`.
    async fn next_range(
        &mut self,
        from_block: BlockNumber,
    ) -> Result<RangeInclusive<BlockNumber>, IndexerError> {
        loop {
            if let Some(range) = self
                .planned
                .as_mut()
                .filter(|planned| planned.next_start() == from_block)
                .and_then(Iterator::next)
            {
                return Ok(range);
            }

            let confirmed_head =
                self.provider.get_latest_confirmed(self.block_confirmations).await?;
            if confirmed_head >= from_block {
                trace!(
                    from_block = from_block,
                    confirmed_head = confirmed_head,
                    "Planning block ranges up to confirmed head"
                );
                self.planned =
                    Some(RangeIterator::forward(from_block, confirmed_head, self.max_block_range));
                continue;
            }

            trace!(
                from_block = from_block,
                confirmed_head = confirmed_head,
                "Waiting for new confirmed blocks"
            );
            sleep(self.poll_interval).await;
        }
    }
}

impl<N: Network> LogStream for RpcLogStream<N> {
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    async fn next_segment(&mut self, from_block: BlockNumber) -> Result<LogSegment, IndexerError> {
        let range = self.next_range(from_block).await?;
        let mut to_block = *range.end();

        loop {
            let filter = self.filter.clone().from_block(from_block).to_block(to_block);
            match self.provider.get_logs(&filter).await {
                Ok(mut logs) => {
                    logs.sort_by_key(log_position);
                    if let Some(planned) = self.planned.as_mut() {
                        planned.reset_to(to_block.saturating_add(1));
                    }
                    return Ok(LogSegment::new(from_block, to_block, logs));
                }
                // The node refused the range, usually because it holds too many logs.
                Err(err) if err.is_error_response() && to_block > from_block => {
                    let halved = from_block + (to_block - from_block + 1) / 2 - 1;
                    warn!(
                        error = %err,
                        from_block = from_block,
                        to_block = to_block,
                        retry_to_block = halved,
                        "eth_getLogs range rejected, halving"
                    );
                    to_block = halved;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
