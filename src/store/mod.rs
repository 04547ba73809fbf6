//! Durable state of the indexer: the ingestion checkpoint and the stored `Sync` events.
//!
//! Two backends implement both [`CheckpointStore`] and [`EventRepository`]:
//! * [`MemoryStore`], an in-process document store used by tests and dry runs;
//! * [`PgStore`], a `PostgreSQL` store built on `sqlx`.
//!
//! Every backend enforces uniqueness of the natural key and pages events in ascending natural-key
//! order.

use std::num::NonZeroU32;

use alloy::primitives::BlockNumber;

use crate::{error::StorageError, types::PoolSyncEvent};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Number of events returned by one [`EventRepository::find`] call.
pub const PAGE_SIZE: u32 = 10;

/// Key of the checkpoint record in the `setting` collection.
pub const CURRENT_BLOCK_NUMBER_KEY: &str = "current_block_number";

/// Persists the highest block number whose logs are fully stored.
pub trait CheckpointStore: Send + Sync {
    /// Returns the checkpoint, or `None` before the first completed round.
    fn get_current_block_number(
        &self,
    ) -> impl Future<Output = Result<Option<BlockNumber>, StorageError>> + Send;

    /// Creates or replaces the checkpoint.
    fn set_current_block_number(
        &self,
        block_number: BlockNumber,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Idempotent storage of [`PoolSyncEvent`]s keyed by their natural key.
pub trait EventRepository: Send + Sync {
    /// Returns page `page` (1-based) of [`PAGE_SIZE`] events in ascending natural-key order.
    fn find(
        &self,
        page: NonZeroU32,
    ) -> impl Future<Output = Result<Vec<PoolSyncEvent>, StorageError>> + Send;

    /// Upserts every event by natural key.
    ///
    /// An existing record with the same key is replaced as a whole. When `events` holds the same
    /// key more than once, the last occurrence wins. Empty input is a no-op.
    fn put_many(
        &self,
        events: &[PoolSyncEvent],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Number of events to skip before `page`.
pub(crate) fn page_offset(page: NonZeroU32) -> u64 {
    u64::from(page.get() - 1) * u64::from(PAGE_SIZE)
}
