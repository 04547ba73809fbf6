use std::{
    collections::{BTreeMap, HashMap},
    num::NonZeroU32,
    sync::Arc,
};

use alloy::primitives::BlockNumber;
use tokio::sync::RwLock;

use crate::{
    codec::{StorageRecord, decode_storage_record, decode_u64, encode, encode_u64},
    error::StorageError,
    store::{CURRENT_BLOCK_NUMBER_KEY, CheckpointStore, EventRepository, PAGE_SIZE, page_offset},
    types::{NaturalKey, PoolSyncEvent},
};

/// In-process document store.
///
/// Holds the `setting` and `pool_event` collections in their encoded form, so reads go through the
/// same codec as a persistent backend would. Clones share the same collections.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collections>>,
}

#[derive(Debug, Default)]
struct Collections {
    setting: HashMap<String, Vec<u8>>,
    pool_event: BTreeMap<NaturalKey, StorageRecord>,
    closed: bool,
}

impl Collections {
    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed { Err(StorageError::Closed) } else { Ok(()) }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the store. Every later operation, on any clone, fails with
    /// [`StorageError::Closed`].
    pub async fn close(&self) {
        self.inner.write().await.closed = true;
        debug!("Memory store closed");
    }

    /// Number of stored events.
    pub async fn len(&self) -> usize {
        self.inner.read().await.pool_event.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl CheckpointStore for MemoryStore {
    async fn get_current_block_number(&self) -> Result<Option<BlockNumber>, StorageError> {
        let collections = self.inner.read().await;
        collections.ensure_open()?;

        collections
            .setting
            .get(CURRENT_BLOCK_NUMBER_KEY)
            .map(|value| decode_u64(CURRENT_BLOCK_NUMBER_KEY, value))
            .transpose()
            .map_err(StorageError::from)
    }

    async fn set_current_block_number(&self, block_number: BlockNumber) -> Result<(), StorageError> {
        let mut collections = self.inner.write().await;
        collections.ensure_open()?;

        collections.setting.insert(CURRENT_BLOCK_NUMBER_KEY.to_owned(), encode_u64(block_number));
        Ok(())
    }
}

impl EventRepository for MemoryStore {
    async fn find(&self, page: NonZeroU32) -> Result<Vec<PoolSyncEvent>, StorageError> {
        let collections = self.inner.read().await;
        collections.ensure_open()?;

        let skip = usize::try_from(page_offset(page)).unwrap_or(usize::MAX);
        collections
            .pool_event
            .values()
            .skip(skip)
            .take(PAGE_SIZE as usize)
            .map(|record| decode_storage_record(record).map_err(StorageError::from))
            .collect()
    }

    async fn put_many(&self, events: &[PoolSyncEvent]) -> Result<(), StorageError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut collections = self.inner.write().await;
        collections.ensure_open()?;

        for event in events {
            collections.pool_event.insert(event.natural_key(), encode(event));
        }
        Ok(())
    }
}
