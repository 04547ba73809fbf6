use alloy::primitives::{Address, B256, U256};

use crate::{error::DecodeError, types::PoolSyncEvent};

/// A [`PoolSyncEvent`] expressed in the store's native value types: opaque byte strings and
/// 32-bit integers.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StorageRecord {
    pub address: Vec<u8>,
    pub block_number: Vec<u8>,
    pub transaction_index: i32,
    pub log_index: i32,
    pub transaction_hash: Vec<u8>,
    pub reserve0: Vec<u8>,
    pub reserve1: Vec<u8>,
}

/// Converts an event into its stored representation.
#[must_use]
pub fn encode(event: &PoolSyncEvent) -> StorageRecord {
    StorageRecord {
        address: event.address.to_vec(),
        block_number: encode_u64(event.block_number),
        transaction_index: i32::from(event.transaction_index),
        log_index: i32::from(event.log_index),
        transaction_hash: event.transaction_hash.to_vec(),
        reserve0: encode_u256(event.reserve0),
        reserve1: encode_u256(event.reserve1),
    }
}

/// Inverse of [`encode`].
///
/// # Errors
///
/// Returns a [`DecodeError`] if a byte string has the wrong length or is not canonical, or if an
/// index does not fit in 16 bits.
pub fn decode_storage_record(record: &StorageRecord) -> Result<PoolSyncEvent, DecodeError> {
    Ok(PoolSyncEvent {
        address: Address::from_slice(fixed_width::<20>("address", &record.address)?),
        block_number: decode_u64("block_number", &record.block_number)?,
        transaction_index: decode_index("transaction_index", record.transaction_index)?,
        log_index: decode_index("log_index", record.log_index)?,
        transaction_hash: B256::from_slice(fixed_width::<32>(
            "transaction_hash",
            &record.transaction_hash,
        )?),
        reserve0: decode_u256("reserve0", &record.reserve0)?,
        reserve1: decode_u256("reserve1", &record.reserve1)?,
    })
}

/// Minimal big-endian encoding of a `u64`. Zero is a single `0x00` byte.
#[must_use]
pub fn encode_u64(value: u64) -> Vec<u8> {
    minimal(&value.to_be_bytes())
}

/// Inverse of [`encode_u64`]. Only canonical encodings are accepted.
///
/// # Errors
///
/// Returns a [`DecodeError`] for an empty, non-canonical or wider than 8 bytes string.
pub fn decode_u64(field: &'static str, bytes: &[u8]) -> Result<u64, DecodeError> {
    let magnitude = canonical(field, bytes, 8)?;
    let mut buf = [0u8; 8];
    buf[8 - magnitude.len()..].copy_from_slice(magnitude);
    Ok(u64::from_be_bytes(buf))
}

fn encode_u256(value: U256) -> Vec<u8> {
    minimal(&value.to_be_bytes::<32>())
}

fn decode_u256(field: &'static str, bytes: &[u8]) -> Result<U256, DecodeError> {
    let magnitude = canonical(field, bytes, 32)?;
    U256::try_from_be_slice(magnitude).ok_or(DecodeError::OutOfRange { field, bits: 256 })
}

fn decode_index(field: &'static str, value: i32) -> Result<u16, DecodeError> {
    u16::try_from(value).map_err(|_| DecodeError::OutOfRange { field, bits: 16 })
}

fn minimal(be_bytes: &[u8]) -> Vec<u8> {
    let first_significant =
        be_bytes.iter().position(|byte| *byte != 0).unwrap_or(be_bytes.len() - 1);
    be_bytes[first_significant..].to_vec()
}

fn canonical<'a>(
    field: &'static str,
    bytes: &'a [u8],
    max_width: usize,
) -> Result<&'a [u8], DecodeError> {
    match bytes {
        [] => Err(DecodeError::InvalidLength { field, expected: 1, actual: 0 }),
        [0, _, ..] => Err(DecodeError::NonCanonical { field }),
        _ if bytes.len() > max_width => Err(DecodeError::OutOfRange {
            field,
            bits: u32::try_from(max_width * 8).unwrap_or(u32::MAX),
        }),
        _ => Ok(bytes),
    }
}

fn fixed_width<'a, const N: usize>(
    field: &'static str,
    bytes: &'a [u8],
) -> Result<&'a [u8], DecodeError> {
    if bytes.len() == N {
        Ok(bytes)
    } else {
        Err(DecodeError::InvalidLength { field, expected: N, actual: bytes.len() })
    }
}
