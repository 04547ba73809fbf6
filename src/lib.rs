//! Pool-sync-indexer ingests the `Sync(uint112,uint112)` events of one liquidity pool from an EVM
//! chain into an idempotent store and serves them over a paginated HTTP API.
//!
//! # Pipeline
//!
//! A [`log_stream::LogStream`] hands out contiguous block ranges ([`LogSegment`]s) with every
//! `Sync` log of the pool inside them. The [`ingestor::Ingestor`] decodes each segment with the
//! [`codec`], writes the events through an [`store::EventRepository`] and then advances the
//! checkpoint kept by a [`store::CheckpointStore`]. The [`api`] module pages the stored events in
//! ascending `(block number, transaction index, log index)` order.
//!
//! # Delivery guarantees
//!
//! Writes are upserts keyed by the [`NaturalKey`], so replaying a segment never creates duplicates.
//! The checkpoint only moves after a whole segment is stored. A crash or a failed round therefore
//! replays from the block after the last checkpoint and converges to the same stored state.
//!
//! # Chain access
//!
//! The [`robust_provider`] module provides [`robust_provider::RobustProvider`], a wrapper that
//! retries with backoff and fails over across multiple RPC endpoints. The ingestion loop itself
//! never retries: any error stops it and leaves the checkpoint untouched.

#[macro_use]
mod logging;

pub mod api;
pub mod codec;
pub mod config;
pub mod ingestor;
pub mod log_stream;
pub mod robust_provider;
pub mod service;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

mod error;
mod types;

pub use error::{ConfigurationError, DecodeError, IndexerError, StorageError};
pub use types::{LogSegment, NaturalKey, PoolSyncEvent, RawLog};

pub use ingestor::{Ingestor, IngestorState, SUB_BATCH_SIZE};
pub use store::{CheckpointStore, EventRepository, MemoryStore, PAGE_SIZE, PgStore};
