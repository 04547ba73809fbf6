//! Wiring of the configured components into the two long-running services.
//!
//! * the ingestion worker: [`RobustProvider`] → [`RpcLogStream`] → [`Ingestor`] → [`PgStore`];
//! * the read API: [`PgStore`] → [`api::serve`].
//!
//! Every entry point returns when its [`CancellationToken`] fires or when the service fails.

use alloy::network::Ethereum;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::{
    api,
    config::Configuration,
    error::{ConfigurationError, IndexerError},
    ingestor::Ingestor,
    log_stream::{RpcLogStream, RpcLogStreamBuilder},
    robust_provider::{RobustProvider, RobustProviderBuilder},
    store::PgStore,
};

/// Builds the chain provider: the first main endpoint is primary, the remaining main endpoints and
/// then the backup endpoints are fallbacks, tried in that order.
///
/// # Errors
///
/// Returns [`IndexerError::Configuration`] without a main endpoint, or
/// [`IndexerError::LogStream`] if an endpoint cannot be connected.
pub async fn connect_provider(
    config: &Configuration,
) -> Result<RobustProvider<Ethereum>, IndexerError> {
    let mut endpoints = config.main_endpoints.iter().chain(&config.backup_endpoints).cloned();
    let primary = endpoints
        .next()
        .ok_or_else(|| ConfigurationError::invalid("main_endpoints", "expect at least one URL"))?;

    let settings = &config.log_stream;
    let provider = endpoints
        .fold(RobustProviderBuilder::new(primary), |builder, endpoint| builder.fallback(endpoint))
        .call_timeout(settings.call_timeout)
        .max_retries(settings.max_retries)
        .min_delay(settings.min_delay)
        .build()
        .await?;

    Ok(provider)
}

/// Builds an ingestor writing to `store`.
///
/// # Errors
///
/// Returns an error if the provider cannot be built or the log stream settings are invalid.
pub async fn build_ingestor(
    config: &Configuration,
    store: PgStore,
) -> Result<Ingestor<RpcLogStream<Ethereum>, PgStore, PgStore>, IndexerError> {
    let provider = connect_provider(config).await?;
    let settings = &config.log_stream;

    let log_stream = RpcLogStreamBuilder::new(config.pool_address)
        .block_confirmations(settings.block_confirmations)
        .max_block_range(settings.max_block_range)
        .poll_interval(settings.poll_interval)
        .connect(provider)?;

    Ok(Ingestor::new(log_stream, store.clone(), store, config.begin_block_number))
}

/// Runs the ingestion worker until `cancel` fires or a round fails.
///
/// # Errors
///
/// Returns the error that stopped the worker.
pub async fn run_worker(
    config: &Configuration,
    cancel: CancellationToken,
) -> Result<(), IndexerError> {
    let store = PgStore::connect(&config.database_url).await?;
    let result = worker(config, &store, cancel).await;

    store.close().await;
    result
}

/// Serves the read API until `cancel` fires.
///
/// # Errors
///
/// Returns an error if the store is unreachable or the listen address cannot be bound.
pub async fn run_api(config: &Configuration, cancel: CancellationToken) -> Result<(), IndexerError> {
    let store = PgStore::connect(&config.database_url).await?;
    let result = server(config, &store, cancel).await;

    store.close().await;
    result
}

/// Runs the worker and the read API side by side on one store.
///
/// When either stops, the other is shut down too.
///
/// # Errors
///
/// Returns the worker's error first, then the API's.
pub async fn run_all(config: &Configuration, cancel: CancellationToken) -> Result<(), IndexerError> {
    let store = PgStore::connect(&config.database_url).await?;
    let cancel = cancel.child_token();

    let worker_task = async {
        let result = worker(config, &store, cancel.clone()).await;
        cancel.cancel();
        result
    };
    let server_task = async {
        let result = server(config, &store, cancel.clone()).await;
        cancel.cancel();
        result
    };
    let (worker_result, server_result) = tokio::join!(worker_task, server_task);

    store.close().await;
    worker_result.and(server_result)
}

async fn worker(
    config: &Configuration,
    store: &PgStore,
    cancel: CancellationToken,
) -> Result<(), IndexerError> {
    build_ingestor(config, store.clone()).await?.run(cancel).await
}

async fn server(
    config: &Configuration,
    store: &PgStore,
    cancel: CancellationToken,
) -> Result<(), IndexerError> {
    let listener = TcpListener::bind(config.listen_address()).await?;
    api::serve(listener, store.clone(), cancel).await
}
