use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use pool_sync_indexer::{
    EventRepository, MemoryStore, PoolSyncEvent, api::router,
    test_utils::{sync_event, test_tx_hash},
};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn get(app: Router, uri: &str) -> anyhow::Result<(StatusCode, Value)> {
    let response = app.oneshot(Request::get(uri).body(Body::empty())?).await?;
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&body)?))
}

async fn seeded_store(count: u16) -> anyhow::Result<MemoryStore> {
    let store = MemoryStore::new();
    let events: Vec<PoolSyncEvent> =
        (0..count).map(|i| sync_event(100 + u64::from(i), 0, i, 1000, 2000)).collect();
    store.put_many(&events).await?;
    Ok(store)
}

#[tokio::test]
async fn first_page_is_the_default() -> anyhow::Result<()> {
    let app = router(seeded_store(12).await?);

    let (status, body) = get(app.clone(), "/pool_event").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(10));
    assert_eq!(body[0]["block_number"], "0x64");

    let (_, explicit) = get(app, "/pool_event?p=1").await?;
    assert_eq!(explicit, body);
    Ok(())
}

#[tokio::test]
async fn later_pages_continue_in_order() -> anyhow::Result<()> {
    let app = router(seeded_store(12).await?);

    let (status, body) = get(app.clone(), "/pool_event?p=2").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            {
                "address": "0x58f876857a02d6762e0101bb5c46a8c1ed44dc16",
                "block_number": "0x6e",
                "transaction_index": 0,
                "log_index": 10,
                "transaction_hash": alloy::hex::encode_prefixed(test_tx_hash(110, 0)),
                "reserve0": "0x3e8",
                "reserve1": "0x7d0",
            },
            {
                "address": "0x58f876857a02d6762e0101bb5c46a8c1ed44dc16",
                "block_number": "0x6f",
                "transaction_index": 0,
                "log_index": 11,
                "transaction_hash": alloy::hex::encode_prefixed(test_tx_hash(111, 0)),
                "reserve0": "0x3e8",
                "reserve1": "0x7d0",
            },
        ])
    );

    let (status, body) = get(app, "/pool_event?p=3").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
    Ok(())
}

#[tokio::test]
async fn invalid_page_is_a_bad_request() -> anyhow::Result<()> {
    let app = router(MemoryStore::new());

    for uri in ["/pool_event?p=0", "/pool_event?p=-2", "/pool_event?p=abc", "/pool_event?p="] {
        let (status, body) = get(app.clone(), uri).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body, json!({ "error": "query: p: expect a positive integer" }), "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_not_found() -> anyhow::Result<()> {
    let (status, body) = get(router(MemoryStore::new()), "/pool_events").await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "message": "no matched resource" }));
    Ok(())
}

#[tokio::test]
async fn store_failure_is_an_internal_error() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    store.close().await;

    let (status, body) = get(router(store), "/pool_event").await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "message": "internal error" }));
    Ok(())
}

#[tokio::test]
async fn responses_allow_any_origin() -> anyhow::Result<()> {
    let request = Request::get("/pool_event")
        .header(header::ORIGIN, "https://example.org")
        .body(Body::empty())?;

    let response = router(MemoryStore::new()).oneshot(request).await?;

    assert_eq!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    Ok(())
}
