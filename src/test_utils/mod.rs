//! Fixtures shared by unit and integration tests.

use std::{
    collections::VecDeque,
    num::NonZeroU32,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use alloy::primitives::{
    Address, BlockNumber, Log as PrimitiveLog, TxHash, U256, address, aliases::U112, keccak256,
};
use alloy::sol_types::SolEvent;

use crate::{
    codec::IPancakePair,
    error::{IndexerError, StorageError},
    log_stream::LogStream,
    store::{CheckpointStore, EventRepository},
    types::{LogSegment, PoolSyncEvent, RawLog},
};

/// Pool address used by [`sync_event`].
pub const TEST_POOL: Address = address!("0x58f876857a02d6762e0101bb5c46a8c1ed44dc16");

/// Deterministic transaction hash for a `(block, transaction index)` pair.
#[must_use]
pub fn test_tx_hash(block_number: BlockNumber, transaction_index: u64) -> TxHash {
    let mut seed = [0u8; 16];
    seed[..8].copy_from_slice(&block_number.to_be_bytes());
    seed[8..].copy_from_slice(&transaction_index.to_be_bytes());
    keccak256(seed)
}

/// Builds a mined `Sync(reserve0, reserve1)` log emitted by `address`.
///
/// # Panics
///
/// If a reserve does not fit in 112 bits.
#[must_use]
pub fn sync_log(
    address: Address,
    block_number: BlockNumber,
    transaction_index: u64,
    log_index: u64,
    reserve0: u128,
    reserve1: u128,
) -> RawLog {
    let sync = IPancakePair::Sync { reserve0: U112::from(reserve0), reserve1: U112::from(reserve1) };

    RawLog {
        inner: PrimitiveLog { address, data: sync.encode_log_data() },
        block_hash: Some(keccak256(block_number.to_be_bytes())),
        block_number: Some(block_number),
        block_timestamp: None,
        transaction_hash: Some(test_tx_hash(block_number, transaction_index)),
        transaction_index: Some(transaction_index),
        log_index: Some(log_index),
        removed: false,
    }
}

/// Builds a decoded event of [`TEST_POOL`].
#[must_use]
pub fn sync_event(
    block_number: BlockNumber,
    transaction_index: u16,
    log_index: u16,
    reserve0: u64,
    reserve1: u64,
) -> PoolSyncEvent {
    PoolSyncEvent {
        address: TEST_POOL,
        block_number,
        transaction_index,
        log_index,
        transaction_hash: test_tx_hash(block_number, u64::from(transaction_index)),
        reserve0: U256::from(reserve0),
        reserve1: U256::from(reserve1),
    }
}

/// [`LogStream`] that replays a fixed list of segments.
///
/// Once the list is exhausted it either fails with [`IndexerError::LogStreamEnded`] or, after
/// [`ScriptedLogStream::pending_when_exhausted`], waits forever like a stream at the chain head.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLogStream {
    segments: VecDeque<LogSegment>,
    pending_when_exhausted: bool,
    requested: Arc<Mutex<Vec<BlockNumber>>>,
}

impl ScriptedLogStream {
    #[must_use]
    pub fn new(segments: Vec<LogSegment>) -> Self {
        Self { segments: segments.into(), ..Self::default() }
    }

    #[must_use]
    pub fn pending_when_exhausted(mut self) -> Self {
        self.pending_when_exhausted = true;
        self
    }

    /// Every `from_block` passed to `next_segment` so far, shared across clones.
    #[must_use]
    pub fn requested_blocks(&self) -> Vec<BlockNumber> {
        self.requested.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl LogStream for ScriptedLogStream {
    async fn next_segment(&mut self, from_block: BlockNumber) -> Result<LogSegment, IndexerError> {
        self.requested.lock().unwrap_or_else(PoisonError::into_inner).push(from_block);

        match self.segments.pop_front() {
            Some(segment) => Ok(segment),
            None if self.pending_when_exhausted => std::future::pending().await,
            None => Err(IndexerError::LogStreamEnded),
        }
    }
}

/// [`EventRepository`] wrapper whose `fail_on`-th `put_many` call (1-based) fails with
/// [`StorageError::Closed`]. Every other call is forwarded.
#[derive(Debug, Clone)]
pub struct FailingRepository<R> {
    inner: R,
    fail_on: usize,
    calls: Arc<AtomicUsize>,
}

impl<R> FailingRepository<R> {
    #[must_use]
    pub fn new(inner: R, fail_on: usize) -> Self {
        Self { inner, fail_on, calls: Arc::new(AtomicUsize::new(0)) }
    }

    /// Number of `put_many` calls seen so far, including the failed one.
    #[must_use]
    pub fn put_many_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<R: EventRepository> EventRepository for FailingRepository<R> {
    async fn find(&self, page: NonZeroU32) -> Result<Vec<PoolSyncEvent>, StorageError> {
        self.inner.find(page).await
    }

    async fn put_many(&self, events: &[PoolSyncEvent]) -> Result<(), StorageError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(StorageError::Closed);
        }
        self.inner.put_many(events).await
    }
}

impl<R: CheckpointStore> CheckpointStore for FailingRepository<R> {
    async fn get_current_block_number(&self) -> Result<Option<BlockNumber>, StorageError> {
        self.inner.get_current_block_number().await
    }

    async fn set_current_block_number(&self, block_number: BlockNumber) -> Result<(), StorageError> {
        self.inner.set_current_block_number(block_number).await
    }
}
