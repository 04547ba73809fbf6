use std::{collections::BTreeMap, num::NonZeroU32, time::Duration};

use alloy::primitives::BlockNumber;
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};

use crate::{
    codec::{StorageRecord, decode_storage_record, decode_u64, encode, encode_u64},
    error::StorageError,
    store::{CURRENT_BLOCK_NUMBER_KEY, CheckpointStore, EventRepository, PAGE_SIZE, page_offset},
    types::{NaturalKey, PoolSyncEvent},
};

const CREATE_SETTING_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS setting (
        key TEXT PRIMARY KEY,
        value BYTEA NOT NULL
    )
";

const CREATE_POOL_EVENT_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS pool_event (
        address BYTEA NOT NULL,
        block_number BYTEA NOT NULL,
        transaction_index INT4 NOT NULL,
        log_index INT4 NOT NULL,
        transaction_hash BYTEA NOT NULL,
        reserve0 BYTEA NOT NULL,
        reserve1 BYTEA NOT NULL,
        UNIQUE (block_number, transaction_index, log_index)
    )
";

/// `PostgreSQL` backend holding the `setting` and `pool_event` tables.
///
/// Numbers are stored with the codec's canonical byte-string encoding, so the ordering
/// `(octet_length(block_number), block_number)` is numeric ordering.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects to `database_url` and creates the tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the URL is invalid, the server is unreachable, or the
    /// schema cannot be created.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options: PgConnectOptions = database_url.parse()?;
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.create_schema().await?;

        info!("Connected to PostgreSQL store");
        Ok(store)
    }

    /// Wraps an existing pool without touching the schema.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `setting` and `pool_event` tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if a statement fails.
    pub async fn create_schema(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_SETTING_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_POOL_EVENT_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// Closes every pooled connection. Later operations fail with [`StorageError::Database`].
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("PostgreSQL store closed");
    }
}

impl CheckpointStore for PgStore {
    async fn get_current_block_number(&self) -> Result<Option<BlockNumber>, StorageError> {
        let value: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT value FROM setting WHERE key = $1")
                .bind(CURRENT_BLOCK_NUMBER_KEY)
                .fetch_optional(&self.pool)
                .await?;

        value
            .map(|value| decode_u64(CURRENT_BLOCK_NUMBER_KEY, &value))
            .transpose()
            .map_err(StorageError::from)
    }

    async fn set_current_block_number(&self, block_number: BlockNumber) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO setting (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            ",
        )
        .bind(CURRENT_BLOCK_NUMBER_KEY)
        .bind(encode_u64(block_number))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl EventRepository for PgStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    async fn find(&self, page: NonZeroU32) -> Result<Vec<PoolSyncEvent>, StorageError> {
        let records: Vec<StorageRecord> = sqlx::query_as(
            r"
            SELECT
                address, block_number, transaction_index, log_index,
                transaction_hash, reserve0, reserve1
            FROM pool_event
            ORDER BY octet_length(block_number), block_number, transaction_index, log_index
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(i64::from(PAGE_SIZE))
        .bind(i64::try_from(page_offset(page)).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        records
            .iter()
            .map(|record| decode_storage_record(record).map_err(StorageError::from))
            .collect()
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "trace", skip_all, fields(events = events.len()))
    )]
    async fn put_many(&self, events: &[PoolSyncEvent]) -> Result<(), StorageError> {
        if events.is_empty() {
            return Ok(());
        }

        // ON CONFLICT cannot touch the same row twice in one statement, so collapse
        // duplicate keys first, keeping the last occurrence.
        let unique: BTreeMap<NaturalKey, &PoolSyncEvent> =
            events.iter().map(|event| (event.natural_key(), event)).collect();

        let mut addresses: Vec<Vec<u8>> = Vec::with_capacity(unique.len());
        let mut block_numbers: Vec<Vec<u8>> = Vec::with_capacity(unique.len());
        let mut transaction_indexes: Vec<i32> = Vec::with_capacity(unique.len());
        let mut log_indexes: Vec<i32> = Vec::with_capacity(unique.len());
        let mut transaction_hashes: Vec<Vec<u8>> = Vec::with_capacity(unique.len());
        let mut reserves0: Vec<Vec<u8>> = Vec::with_capacity(unique.len());
        let mut reserves1: Vec<Vec<u8>> = Vec::with_capacity(unique.len());

        for event in unique.into_values() {
            let record = encode(event);
            addresses.push(record.address);
            block_numbers.push(record.block_number);
            transaction_indexes.push(record.transaction_index);
            log_indexes.push(record.log_index);
            transaction_hashes.push(record.transaction_hash);
            reserves0.push(record.reserve0);
            reserves1.push(record.reserve1);
        }

        sqlx::query(
            r"
            INSERT INTO pool_event (
                address, block_number, transaction_index, log_index,
                transaction_hash, reserve0, reserve1
            )
            SELECT * FROM UNNEST(
                $1::bytea[], $2::bytea[], $3::int4[], $4::int4[],
                $5::bytea[], $6::bytea[], $7::bytea[]
            )
            ON CONFLICT (block_number, transaction_index, log_index) DO UPDATE SET
                address = EXCLUDED.address,
                transaction_hash = EXCLUDED.transaction_hash,
                reserve0 = EXCLUDED.reserve0,
                reserve1 = EXCLUDED.reserve1
            ",
        )
        .bind(&addresses[..])
        .bind(&block_numbers[..])
        .bind(&transaction_indexes[..])
        .bind(&log_indexes[..])
        .bind(&transaction_hashes[..])
        .bind(&reserves0[..])
        .bind(&reserves1[..])
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
