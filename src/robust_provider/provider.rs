use std::{fmt::Debug, time::Duration};

use alloy::{
    network::{Ethereum, Network},
    providers::{Provider, RootProvider},
    rpc::types::{Filter, Log},
    transports::{RpcError, TransportErrorKind},
};
use backon::{ExponentialBuilder, Retryable};
use tokio::time::timeout;

use crate::robust_provider::Error;

/// Provider wrapper with built-in retry and timeout mechanisms.
///
/// This wrapper around Alloy providers automatically handles retries,
/// timeouts, and error logging for RPC calls.
#[derive(Clone, Debug)]
pub struct RobustProvider<N: Network = Ethereum> {
    pub(crate) primary_provider: RootProvider<N>,
    pub(crate) fallback_providers: Vec<RootProvider<N>>,
    pub(crate) call_timeout: Duration,
    pub(crate) max_retries: usize,
    pub(crate) min_delay: Duration,
}

impl<N: Network> RobustProvider<N> {
    /// Get a reference to the primary provider
    #[must_use]
    pub fn primary(&self) -> &RootProvider<N> {
        &self.primary_provider
    }

    /// Fetch the latest block number with retry and timeout.
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn get_block_number(&self) -> Result<u64, Error> {
        trace!("eth_blockNumber called");
        let result = self
            .try_operation_with_failover(move |provider| async move {
                provider.get_block_number().await
            })
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_blockNumber failed");
        }
        result
    }

    /// Fetch the latest confirmed block number with retry and timeout.
    ///
    /// # Arguments
    ///
    /// * `confirmations` - The number of block confirmations to wait for. The returned block number
    ///   will be `latest_block - confirmations`, saturating at zero.
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn get_latest_confirmed(&self, confirmations: u64) -> Result<u64, Error> {
        let latest_block = self.get_block_number().await?;
        let confirmed_block = latest_block.saturating_sub(confirmations);
        trace!(latest_block = latest_block, confirmed_block = confirmed_block, "Resolved chain tip");
        Ok(confirmed_block)
    }

    /// Fetch logs for the given [`Filter`] with retry and timeout.
    ///
    /// # Errors
    ///
    /// See [retry errors](#retry-errors).
    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, Error> {
        trace!("eth_getLogs called");
        let result = self
            .try_operation_with_failover(move |provider| async move {
                provider.get_logs(filter).await
            })
            .await;
        if let Err(e) = &result {
            // Error responses are expected for oversized ranges; the caller decides what to do.
            if e.is_error_response() {
                debug!(error = %e, "eth_getLogs rejected");
            } else {
                error!(error = %e, "eth_getLogs failed");
            }
        }
        result
    }

    /// Execute `operation` with exponential backoff and a total timeout.
    ///
    /// Wraps the retry logic with `tokio::time::timeout(self.call_timeout, ...)` so
    /// the entire operation (including time spent inside the RPC call) cannot exceed
    /// `call_timeout`.
    ///
    /// If the primary provider fails, each fallback provider is tried in sequence.
    ///
    /// # Errors
    /// <a name="retry-errors"></a>
    ///
    /// * Returns [`Error::Timeout`] if the overall timeout elapses on the last provider tried.
    /// * Propagates the last [`RpcError<TransportErrorKind>`] otherwise.
    pub(crate) async fn try_operation_with_failover<T: Debug, F, Fut>(
        &self,
        operation: F,
    ) -> Result<T, Error>
    where
        F: Fn(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        match self.try_provider_with_timeout(self.primary(), &operation).await {
            Ok(value) => Ok(value),
            Err(last_error) => self.try_fallback_providers(&operation, last_error).await,
        }
    }

    async fn try_fallback_providers<T: Debug, F, Fut>(
        &self,
        operation: F,
        mut last_error: Error,
    ) -> Result<T, Error>
    where
        F: Fn(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let num_fallbacks = self.fallback_providers.len();
        if num_fallbacks == 0 {
            return Err(last_error);
        }

        info!(error = %last_error, "Primary provider failed, trying fallback provider(s)");

        for (fallback_idx, provider) in self.fallback_providers.iter().enumerate() {
            let provider_num = fallback_idx + 1;
            debug!(
                provider_num = provider_num,
                num_fallbacks = num_fallbacks,
                "Attempting fallback provider"
            );

            match self.try_provider_with_timeout(provider, &operation).await {
                Ok(value) => {
                    info!(provider_num = provider_num, "Fallback provider succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(provider_num = provider_num, error = %e, "Fallback provider failed");
                    last_error = e;
                }
            }
        }

        error!("All providers failed or timed out - returning the last provider's error");
        Err(last_error)
    }

    /// Try executing an operation with a specific provider with retry and timeout.
    async fn try_provider_with_timeout<T, F, Fut>(
        &self,
        provider: &RootProvider<N>,
        operation: F,
    ) -> Result<T, Error>
    where
        F: Fn(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let retry_strategy = ExponentialBuilder::default()
            .with_max_times(self.max_retries)
            .with_min_delay(self.min_delay);

        timeout(
            self.call_timeout,
            (|| operation(provider.clone()))
                .retry(retry_strategy)
                .notify(|err: &RpcError<TransportErrorKind>, dur: Duration| {
                    debug!(error = %err, delay_ms = dur.as_millis(), "RPC error, retrying");
                })
                .sleep(tokio::time::sleep),
        )
        .await
        .map_err(Error::from)?
        .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::rpc::json_rpc::ErrorPayload;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn test_provider(timeout: u64, max_retries: usize, min_delay: u64) -> RobustProvider {
        RobustProvider {
            primary_provider: RootProvider::new_http("http://localhost:8545".parse().unwrap()),
            fallback_providers: vec![],
            call_timeout: Duration::from_millis(timeout),
            max_retries,
            min_delay: Duration::from_millis(min_delay),
        }
    }

    #[tokio::test]
    async fn test_retry_with_timeout_succeeds_on_first_attempt() {
        let provider = test_provider(100, 3, 10);

        let call_count = AtomicUsize::new(0);

        let result = provider
            .try_operation_with_failover(|_| async {
                call_count.fetch_add(1, Ordering::SeqCst);
                let count = call_count.load(Ordering::SeqCst);
                Ok(count)
            })
            .await;

        assert!(matches!(result, Ok(1)));
    }

    #[tokio::test]
    async fn test_retry_with_timeout_retries_on_error() {
        let provider = test_provider(100, 3, 10);

        let call_count = AtomicUsize::new(0);

        let result = provider
            .try_operation_with_failover(|_| async {
                call_count.fetch_add(1, Ordering::SeqCst);
                let count = call_count.load(Ordering::SeqCst);
                match count {
                    3 => Ok(count),
                    _ => Err(TransportErrorKind::BackendGone.into()),
                }
            })
            .await;

        assert!(matches!(result, Ok(3)));
    }

    #[tokio::test]
    async fn test_retry_with_timeout_fails_after_max_retries() {
        let provider = test_provider(100, 2, 10);

        let call_count = AtomicUsize::new(0);

        let result: Result<(), Error> = provider
            .try_operation_with_failover(|_| async {
                call_count.fetch_add(1, Ordering::SeqCst);
                Err(TransportErrorKind::BackendGone.into())
            })
            .await;

        assert!(matches!(result, Err(Error::RpcError(_))));
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_with_timeout_respects_call_timeout() {
        let call_timeout = 50;
        let provider = test_provider(call_timeout, 10, 1);

        let result = provider
            .try_operation_with_failover(move |_provider| async move {
                sleep(Duration::from_millis(call_timeout + 10)).await;
                Ok(42)
            })
            .await;

        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn fallback_is_used_after_primary_exhausts_retries() {
        let mut provider = test_provider(100, 1, 1);
        provider.fallback_providers =
            vec![RootProvider::new_http("http://localhost:8546".parse().unwrap())];

        let call_count = AtomicUsize::new(0);

        // Primary sees calls 1 and 2, the fallback answers on call 3.
        let result = provider
            .try_operation_with_failover(|_| async {
                let count = call_count.fetch_add(1, Ordering::SeqCst) + 1;
                if count <= 2 { Err(TransportErrorKind::BackendGone.into()) } else { Ok(count) }
            })
            .await;

        assert!(matches!(result, Ok(3)));
    }

    #[tokio::test]
    async fn error_response_is_reported_as_such() {
        let provider = test_provider(100, 0, 1);

        let result: Result<(), Error> = provider
            .try_operation_with_failover(|_| async {
                Err(RpcError::ErrorResp(ErrorPayload {
                    code: -32005,
                    message: "query returned more than 10000 results".into(),
                    data: None,
                }))
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_error_response());
        assert!(!Error::Timeout.is_error_response());
    }
}
