use std::path::PathBuf;

use alloy::primitives::BlockNumber;
use thiserror::Error;

use crate::robust_provider::Error as RobustProviderError;

/// Errors that stop the ingestion loop or prevent it from starting.
///
/// None of them is retried internally: the loop returns the error and leaves the checkpoint
/// untouched, so restarting the process resumes from the last fully stored segment.
#[derive(Error, Debug)]
pub enum IndexerError {
    /// A raw log or a stored record could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The store rejected a read or a write.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The configuration is unusable.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The chain provider failed after exhausting its retries and fallbacks.
    #[error("Log stream error: {0}")]
    LogStream(#[from] RobustProviderError),

    /// The log stream answered with a segment that does not continue from the requested block.
    #[error("Segment {from_block}..={to_block} does not continue from block {expected}")]
    SegmentOutOfOrder { expected: BlockNumber, from_block: BlockNumber, to_block: BlockNumber },

    /// The log stream has no more segments to deliver.
    #[error("Log stream ended")]
    LogStreamEnded,

    /// The configured maximum block range is invalid (must be greater than zero).
    #[error("Max block range must be greater than 0")]
    InvalidMaxBlockRange,

    /// The read API could not bind or serve.
    #[error("API server error: {0}")]
    Server(#[from] std::io::Error),
}

/// A value could not be turned into a [`PoolSyncEvent`](crate::PoolSyncEvent).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{0}: missing")]
    MissingField(&'static str),

    #[error("{field}: expect {expected} bytes, got {actual}")]
    InvalidLength { field: &'static str, expected: usize, actual: usize },

    #[error("{field}: value does not fit in {bits} bits")]
    OutOfRange { field: &'static str, bits: u32 },

    #[error("{field}: expect a minimal big-endian byte string")]
    NonCanonical { field: &'static str },

    #[error("Sync event payload: {0}")]
    Payload(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored record no longer decodes into an event.
    #[error("Corrupted record: {0}")]
    CorruptedRecord(#[from] DecodeError),

    #[error("Store is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("{}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("{}: {source}", path.display())]
    Parse { path: PathBuf, source: serde_json::Error },

    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("{}: expect file mode 0600 or stricter, got {mode:o}", path.display())]
    InsecurePermissions { path: PathBuf, mode: u32 },
}

impl ConfigurationError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigurationError::Invalid { field, reason: reason.into() }
    }
}
