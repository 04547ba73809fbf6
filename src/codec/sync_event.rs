use alloy::{
    primitives::{B256, U256},
    sol,
    sol_types::SolEvent,
};

use crate::{
    error::DecodeError,
    types::{PoolSyncEvent, RawLog},
};

sol! {
    /// The subset of the pool contract interface the indexer consumes.
    interface IPancakePair {
        event Sync(uint112 reserve0, uint112 reserve1);
    }
}

/// `topic0` of every `Sync` log.
#[must_use]
pub fn sync_topic() -> B256 {
    IPancakePair::Sync::SIGNATURE_HASH
}

/// Decodes a raw `Sync` log into a [`PoolSyncEvent`].
///
/// Header fields are copied from the log. Pending logs (without a block, transaction or log
/// position) and positions that do not fit in 16 bits are rejected.
///
/// # Errors
///
/// Returns a [`DecodeError`] if a header field is missing or out of range, or if the topics and
/// data do not form a `Sync(uint112,uint112)` event.
pub fn decode_sync_log(log: &RawLog) -> Result<PoolSyncEvent, DecodeError> {
    let block_number = log.block_number.ok_or(DecodeError::MissingField("block_number"))?;
    let transaction_index = narrow_index(
        "transaction_index",
        log.transaction_index.ok_or(DecodeError::MissingField("transaction_index"))?,
    )?;
    let log_index =
        narrow_index("log_index", log.log_index.ok_or(DecodeError::MissingField("log_index"))?)?;
    let transaction_hash =
        log.transaction_hash.ok_or(DecodeError::MissingField("transaction_hash"))?;

    // Validating decode: a reserve word wider than 112 bits is an error, not truncated.
    let sync = IPancakePair::Sync::decode_log_data_validate(log.data())
        .map_err(|err| DecodeError::Payload(err.to_string()))?;

    Ok(PoolSyncEvent {
        address: log.address(),
        block_number,
        transaction_index,
        log_index,
        transaction_hash,
        reserve0: U256::from(sync.reserve0),
        reserve1: U256::from(sync.reserve1),
    })
}

fn narrow_index(field: &'static str, value: u64) -> Result<u16, DecodeError> {
    u16::try_from(value).map_err(|_| DecodeError::OutOfRange { field, bits: 16 })
}
