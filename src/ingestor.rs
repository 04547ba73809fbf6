//! The ingestion loop.
//!
//! One [`Ingestor`] drives a single sequential worker: it pulls a [`LogSegment`], decodes and
//! stores its logs in sub-batches of [`SUB_BATCH_SIZE`], and only then moves the checkpoint to
//! the segment's last block. A failure anywhere in a round leaves the checkpoint untouched, so a
//! restart replays the whole segment and the idempotent upserts absorb what was already stored.

use alloy::primitives::BlockNumber;
use tokio_util::sync::CancellationToken;

use crate::{
    codec::decode_sync_log,
    error::IndexerError,
    log_stream::LogStream,
    store::{CheckpointStore, EventRepository},
    types::{LogSegment, PoolSyncEvent},
};

/// Maximum number of logs decoded and written in one `put_many` call.
pub const SUB_BATCH_SIZE: usize = 512;

/// Lifecycle of an [`Ingestor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestorState {
    /// The start block has not been resolved yet.
    Init,
    /// Rounds are being processed.
    Running,
    /// A round failed. The error was returned by [`Ingestor::run`].
    Failed,
}

pub struct Ingestor<S, C, R> {
    log_stream: S,
    checkpoints: C,
    events: R,
    begin_block: BlockNumber,
    state: IngestorState,
}

impl<S: LogStream, C: CheckpointStore, R: EventRepository> Ingestor<S, C, R> {
    /// Creates an ingestor that starts at `begin_block` unless a checkpoint exists.
    #[must_use]
    pub fn new(log_stream: S, checkpoints: C, events: R, begin_block: BlockNumber) -> Self {
        Self { log_stream, checkpoints, events, begin_block, state: IngestorState::Init }
    }

    #[must_use]
    pub fn state(&self) -> IngestorState {
        self.state
    }

    /// The block the next run starts at: the block after the checkpoint, or the configured
    /// begin block when there is no checkpoint yet.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Storage`] if the checkpoint cannot be read.
    pub async fn start_block(&self) -> Result<BlockNumber, IndexerError> {
        let start = match self.checkpoints.get_current_block_number().await? {
            Some(checkpoint) => checkpoint.saturating_add(1),
            None => self.begin_block,
        };
        Ok(start)
    }

    /// Runs rounds until `cancel` fires or a round fails.
    ///
    /// Cancellation returns `Ok(())`. An interrupted round is not committed.
    ///
    /// # Errors
    ///
    /// Returns the first error of any round. Nothing is retried here.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), IndexerError> {
        let result = self.run_until_cancelled(&cancel).await;
        if let Err(err) = &result {
            self.state = IngestorState::Failed;
            error!(error = %err, "Ingestion stopped");
        }
        result
    }

    async fn run_until_cancelled(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<(), IndexerError> {
        let mut cursor = self.start_block().await?;
        self.state = IngestorState::Running;
        info!(from_block = cursor, "Start ingesting");

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    info!(next_block = cursor, "Ingestion cancelled");
                    return Ok(());
                }
                next = self.run_round(cursor) => {
                    cursor = next?;
                }
            }
        }
    }

    /// Processes one segment starting at `cursor` and returns the next cursor.
    ///
    /// # Errors
    ///
    /// * [`IndexerError::SegmentOutOfOrder`] if the segment does not start at `cursor` or ends
    ///   before it starts. Nothing is written.
    /// * [`IndexerError::Decode`] or [`IndexerError::Storage`] if a sub-batch fails. Earlier
    ///   sub-batches stay stored; the checkpoint is not moved.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub async fn run_round(&mut self, cursor: BlockNumber) -> Result<BlockNumber, IndexerError> {
        let segment = self.log_stream.next_segment(cursor).await?;
        if segment.from_block != cursor || segment.to_block < segment.from_block {
            return Err(IndexerError::SegmentOutOfOrder {
                expected: cursor,
                from_block: segment.from_block,
                to_block: segment.to_block,
            });
        }

        info!(
            from_block = segment.from_block,
            to_block = segment.to_block,
            blocks = segment.block_count(),
            logs = segment.logs.len(),
            "begin round"
        );

        self.ingest_segment(&segment).await?;
        self.checkpoints.set_current_block_number(segment.to_block).await?;

        info!(
            from_block = segment.from_block,
            to_block = segment.to_block,
            blocks = segment.block_count(),
            logs = segment.logs.len(),
            "end round"
        );

        Ok(segment.to_block.saturating_add(1))
    }

    async fn ingest_segment(&self, segment: &LogSegment) -> Result<(), IndexerError> {
        let total = segment.logs.len();
        let mut saved = 0;

        for sub_batch in segment.logs.chunks(SUB_BATCH_SIZE) {
            let events =
                sub_batch.iter().map(decode_sync_log).collect::<Result<Vec<PoolSyncEvent>, _>>()?;
            self.events.put_many(&events).await?;

            saved += sub_batch.len();
            info!("save log segment {saved}/{total}");
        }

        Ok(())
    }
}
