//! Configuration file loading and validation.
//!
//! The file is JSON. Unknown fields are rejected and omitted fields take the defaults below.
//!
//! ```json
//! {
//!     "database_url": "postgres://localhost/pool_sync",
//!     "main_endpoints": ["https://bsc-dataseed.bnbchain.org"],
//!     "backup_endpoints": [],
//!     "pool_address": "0x58f876857a02d6762e0101bb5c46a8c1ed44dc16",
//!     "begin_block_number": 6810708,
//!     "host": "127.0.0.1",
//!     "port": 8080,
//!     "log_stream": {
//!         "block_confirmations": 15,
//!         "max_block_range": 5000,
//!         "poll_interval_ms": 3000,
//!         "call_timeout_ms": 60000,
//!         "max_retries": 3,
//!         "min_delay_ms": 1000
//!     }
//! }
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy::{
    primitives::{Address, BlockNumber},
    transports::http::reqwest::Url,
};
use serde::Deserialize;

use crate::{
    error::ConfigurationError,
    log_stream::{DEFAULT_BLOCK_CONFIRMATIONS, DEFAULT_MAX_BLOCK_RANGE, DEFAULT_POLL_INTERVAL},
    robust_provider::{DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_RETRIES, DEFAULT_MIN_DELAY},
};

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/pool_sync";
pub const DEFAULT_POOL_ADDRESS: &str = "0x58f876857a02d6762e0101bb5c46a8c1ed44dc16";
pub const DEFAULT_BEGIN_BLOCK_NUMBER: BlockNumber = 6_810_708;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

/// Validated configuration of the worker and the read API.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub database_url: String,
    /// Never empty. The first entry is the primary endpoint.
    pub main_endpoints: Vec<Url>,
    pub backup_endpoints: Vec<Url>,
    pub pool_address: Address,
    pub begin_block_number: BlockNumber,
    pub host: String,
    pub port: u16,
    pub log_stream: LogStreamSettings,
}

/// Chain access settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStreamSettings {
    pub block_confirmations: u64,
    pub max_block_range: u64,
    pub poll_interval: Duration,
    pub call_timeout: Duration,
    pub max_retries: usize,
    pub min_delay: Duration,
}

impl Default for LogStreamSettings {
    fn default() -> Self {
        Self {
            block_confirmations: DEFAULT_BLOCK_CONFIRMATIONS,
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay: DEFAULT_MIN_DELAY,
        }
    }
}

impl Configuration {
    /// Reads, parses and validates the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the file cannot be read, is accessible by group or
    /// others (Unix only), is not valid JSON for this schema, or holds an invalid value.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let io_error = |source| ConfigurationError::Io { path: path.to_path_buf(), source };

        check_permissions(path)?;
        let content = std::fs::read_to_string(path).map_err(io_error)?;
        let raw: RawConfiguration = serde_json::from_str(&content)
            .map_err(|source| ConfigurationError::Parse { path: path.to_path_buf(), source })?;

        let configuration = raw.validate()?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(configuration)
    }

    /// Socket address string the read API binds to.
    #[must_use]
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(unix)]
fn check_permissions(path: &Path) -> Result<(), ConfigurationError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)
        .map_err(|source| ConfigurationError::Io { path: path.to_path_buf(), source })?;
    let mode = metadata.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        return Err(ConfigurationError::InsecurePermissions { path: PathBuf::from(path), mode });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path) -> Result<(), ConfigurationError> {
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfiguration {
    #[serde(default = "default_database_url")]
    database_url: String,
    main_endpoints: Vec<String>,
    #[serde(default)]
    backup_endpoints: Vec<String>,
    #[serde(default = "default_pool_address")]
    pool_address: String,
    #[serde(default = "default_begin_block_number")]
    begin_block_number: BlockNumber,
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    log_stream: RawLogStreamSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawLogStreamSettings {
    block_confirmations: u64,
    max_block_range: u64,
    poll_interval_ms: u64,
    call_timeout_ms: u64,
    max_retries: usize,
    min_delay_ms: u64,
}

impl Default for RawLogStreamSettings {
    fn default() -> Self {
        let defaults = LogStreamSettings::default();
        Self {
            block_confirmations: defaults.block_confirmations,
            max_block_range: defaults.max_block_range,
            poll_interval_ms: duration_ms(defaults.poll_interval),
            call_timeout_ms: duration_ms(defaults.call_timeout),
            max_retries: defaults.max_retries,
            min_delay_ms: duration_ms(defaults.min_delay),
        }
    }
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_owned()
}

fn default_pool_address() -> String {
    DEFAULT_POOL_ADDRESS.to_owned()
}

const fn default_begin_block_number() -> BlockNumber {
    DEFAULT_BEGIN_BLOCK_NUMBER
}

fn default_host() -> String {
    DEFAULT_HOST.to_owned()
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl RawConfiguration {
    fn validate(self) -> Result<Configuration, ConfigurationError> {
        validate_database_url(&self.database_url)?;

        let main_endpoints = parse_endpoints("main_endpoints", &self.main_endpoints)?;
        if main_endpoints.is_empty() {
            return Err(ConfigurationError::invalid("main_endpoints", "expect an item at least"));
        }
        let backup_endpoints = parse_endpoints("backup_endpoints", &self.backup_endpoints)?;

        if self.host.trim().is_empty() {
            return Err(ConfigurationError::invalid("host", "expect a host name or an IP address"));
        }

        let log_stream = self.log_stream;
        if log_stream.max_block_range == 0 {
            return Err(ConfigurationError::invalid(
                "log_stream.max_block_range",
                "expect a positive integer",
            ));
        }
        if log_stream.call_timeout_ms == 0 {
            return Err(ConfigurationError::invalid(
                "log_stream.call_timeout_ms",
                "expect a positive integer",
            ));
        }

        Ok(Configuration {
            database_url: self.database_url,
            main_endpoints,
            backup_endpoints,
            pool_address: parse_pool_address(&self.pool_address)?,
            begin_block_number: self.begin_block_number,
            host: self.host,
            port: self.port,
            log_stream: LogStreamSettings {
                block_confirmations: log_stream.block_confirmations,
                max_block_range: log_stream.max_block_range,
                poll_interval: Duration::from_millis(log_stream.poll_interval_ms),
                call_timeout: Duration::from_millis(log_stream.call_timeout_ms),
                max_retries: log_stream.max_retries,
                min_delay: Duration::from_millis(log_stream.min_delay_ms),
            },
        })
    }
}

fn validate_database_url(value: &str) -> Result<(), ConfigurationError> {
    let url = Url::parse(value)
        .map_err(|err| ConfigurationError::invalid("database_url", err.to_string()))?;
    if !matches!(url.scheme(), "postgres" | "postgresql") {
        return Err(ConfigurationError::invalid(
            "database_url",
            format!("expect scheme postgres or postgresql, got {}", url.scheme()),
        ));
    }
    if url.path().trim_start_matches('/').is_empty() {
        return Err(ConfigurationError::invalid("database_url", "expect a database name"));
    }
    Ok(())
}

fn parse_endpoints(field: &'static str, values: &[String]) -> Result<Vec<Url>, ConfigurationError> {
    values
        .iter()
        .map(|value| {
            let url = Url::parse(value).map_err(|err| {
                ConfigurationError::invalid(field, format!("{value}: {err}"))
            })?;
            if matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
                Ok(url)
            } else {
                Err(ConfigurationError::invalid(
                    field,
                    format!("{value}: expect an http, https, ws or wss URL"),
                ))
            }
        })
        .collect()
}

fn parse_pool_address(value: &str) -> Result<Address, ConfigurationError> {
    let well_formed = value.len() == 42
        && value.starts_with("0x")
        && value[2..].bytes().all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'));
    if !well_formed {
        return Err(ConfigurationError::invalid(
            "pool_address",
            "expect 0x followed by 40 lowercase hex digits",
        ));
    }
    value
        .parse::<Address>()
        .map_err(|err| ConfigurationError::invalid("pool_address", err.to_string()))
}
