use std::sync::Arc;

use alloy::{
    eips::BlockId,
    transports::{RpcError, TransportErrorKind},
};
use thiserror::Error;
use tokio::time::error::Elapsed;

/// Errors returned by [`RobustProvider`](super::RobustProvider) calls once every retry and every
/// fallback provider has been exhausted.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Operation timed out")]
    Timeout,

    #[error("RPC error: {0}")]
    RpcError(Arc<RpcError<TransportErrorKind>>),

    #[error("Block not found, Block Id: {0}")]
    BlockNotFound(BlockId),
}

impl Error {
    /// Returns `true` when the node answered with a JSON-RPC error response, as opposed to a
    /// transport failure or a timeout.
    ///
    /// Nodes reject oversized `eth_getLogs` queries this way.
    #[must_use]
    pub fn is_error_response(&self) -> bool {
        matches!(self, Error::RpcError(err) if err.as_error_resp().is_some())
    }
}

impl From<RpcError<TransportErrorKind>> for Error {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        Error::RpcError(Arc::new(err))
    }
}

impl From<Elapsed> for Error {
    fn from(_: Elapsed) -> Self {
        Error::Timeout
    }
}
