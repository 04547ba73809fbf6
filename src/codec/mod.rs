//! Conversions between raw chain logs, [`PoolSyncEvent`](crate::PoolSyncEvent) and the store's
//! native value types.
//!
//! Numbers wider than 32 bits are stored as big-endian byte strings of minimal length, with zero
//! written as a single `0x00` byte. Every number therefore has exactly one encoding, and ordering
//! by `(length, bytes)` matches numeric ordering.

mod record;
mod sync_event;

pub use record::{StorageRecord, decode_storage_record, decode_u64, encode, encode_u64};
pub use sync_event::{IPancakePair, decode_sync_log, sync_topic};
