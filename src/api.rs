//! Read-only HTTP API over the stored events.
//!
//! * `GET /pool_event?p=<page>`: page `p` (default 1) of [`PAGE_SIZE`](crate::store::PAGE_SIZE)
//!   events in ascending natural-key order.
//!
//! Any other route answers `404 {"message": "no matched resource"}`.

use std::num::NonZeroU32;

use alloy::hex;
use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::{IndexerError, StorageError},
    store::EventRepository,
    types::PoolSyncEvent,
};

const INVALID_PAGE_MESSAGE: &str = "query: p: expect a positive integer";

/// JSON form of a [`PoolSyncEvent`].
///
/// Addresses, hashes, the block number and reserves are `0x`-prefixed lowercase hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEventItem {
    pub address: String,
    pub block_number: String,
    pub transaction_index: u16,
    pub log_index: u16,
    pub transaction_hash: String,
    pub reserve0: String,
    pub reserve1: String,
}

impl From<&PoolSyncEvent> for PoolEventItem {
    fn from(event: &PoolSyncEvent) -> Self {
        Self {
            address: hex::encode_prefixed(event.address),
            block_number: format!("{:#x}", event.block_number),
            transaction_index: event.transaction_index,
            log_index: event.log_index,
            transaction_hash: hex::encode_prefixed(event.transaction_hash),
            reserve0: format!("{:#x}", event.reserve0),
            reserve1: format!("{:#x}", event.reserve1),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    p: Option<String>,
}

#[derive(Debug)]
enum ApiError {
    InvalidPage,
    Storage(StorageError),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Storage(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidPage => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": INVALID_PAGE_MESSAGE })))
                    .into_response()
            }
            ApiError::Storage(err) => {
                error!(error = %err, "Failed to read pool events");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "internal error" })))
                    .into_response()
            }
        }
    }
}

/// Builds the API router over `events`.
pub fn router<R>(events: R) -> Router
where
    R: EventRepository + Clone + 'static,
{
    Router::new()
        .route("/pool_event", get(get_pool_events::<R>))
        .route("/pool_event/", get(get_pool_events::<R>))
        .fallback(not_found)
        .with_state(events)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

/// Serves the API on `listener` until `cancel` fires.
///
/// # Errors
///
/// Returns [`IndexerError::Server`] if the listener fails.
pub async fn serve<R>(
    listener: TcpListener,
    events: R,
    cancel: CancellationToken,
) -> Result<(), IndexerError>
where
    R: EventRepository + Clone + 'static,
{
    if let Ok(address) = listener.local_addr() {
        info!(address = %address, "Serving read API");
    }

    axum::serve(listener, router(events))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    info!("Read API stopped");
    Ok(())
}

async fn get_pool_events<R: EventRepository>(
    State(events): State<R>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Vec<PoolEventItem>>, ApiError> {
    let Query(query) = query.map_err(|_| ApiError::InvalidPage)?;
    let page = parse_page(query.p.as_deref())?;

    let items = events.find(page).await?.iter().map(PoolEventItem::from).collect();
    Ok(Json(items))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "no matched resource" })))
}

/// Parses the `p` query parameter: absent means page 1, otherwise a positive decimal integer.
fn parse_page(value: Option<&str>) -> Result<NonZeroU32, ApiError> {
    let Some(value) = value else {
        return Ok(NonZeroU32::MIN);
    };
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ApiError::InvalidPage);
    }
    value.parse::<NonZeroU32>().map_err(|_| ApiError::InvalidPage)
}
