//! Robust, retrying wrapper around Alloy providers.
//!
//! This module exposes [`RobustProvider`], a small wrapper around Alloy's
//! [`RootProvider`](alloy::providers::RootProvider) that adds:
//! * bounded per-call timeouts
//! * exponential backoff retries
//! * transparent failover between a primary and one or more fallback providers
//!
//! The ingestion loop never retries on its own; every transient chain failure is absorbed here
//! or surfaced as a terminal [`Error`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use alloy::providers::ProviderBuilder;
//! use pool_sync_indexer::robust_provider::RobustProviderBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let primary = ProviderBuilder::new().connect("https://bsc-dataseed.bnbchain.org").await?;
//!
//! let robust = RobustProviderBuilder::new(primary)
//!     .fallback("https://bsc-dataseed1.defibit.io")
//!     .call_timeout(Duration::from_secs(30))
//!     .build()
//!     .await?;
//!
//! let block_number = robust.get_block_number().await?;
//! println!("Current block: {block_number}");
//! # Ok(()) }
//! ```

pub mod builder;
pub mod error;
pub mod provider;
pub mod provider_conversion;

pub use builder::*;
pub use error::Error;
pub use provider::RobustProvider;
pub use provider_conversion::IntoRootProvider;
