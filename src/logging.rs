//! Logging for the library side of the indexer.
//!
//! Ingestion rounds, provider failover and store access log through `error!`, `warn!`, `info!`,
//! `debug!` and `trace!`. With the default `tracing` feature they become `tracing` events under
//! the `pool_sync_indexer` target, so `RUST_LOG=pool_sync_indexer=debug` selects them. Without the
//! feature they expand to nothing but a borrow of each field value.
//!
//! Call sites stick to the shapes the no-op expansion understands: `name = value`,
//! `name = %value` or `name = ?value` fields, followed by a message literal that may capture
//! locals inline (`"save log segment {saved}/{total}"`).

#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => {
        tracing::error!(target: "pool_sync_indexer", $($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::__log_fields_noop!($($arg)*)
    };
}

#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "pool_sync_indexer", $($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::__log_fields_noop!($($arg)*)
    };
}

#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => {
        tracing::info!(target: "pool_sync_indexer", $($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::__log_fields_noop!($($arg)*)
    };
}

#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "pool_sync_indexer", $($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::__log_fields_noop!($($arg)*)
    };
}

#[cfg(feature = "tracing")]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "pool_sync_indexer", $($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::__log_fields_noop!($($arg)*)
    };
}

#[doc(hidden)]
#[macro_export]
#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
macro_rules! __log_fields_noop {
    // name = %value, ...
    ($field:ident = % $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__log_fields_noop!($($rest)*); }
    };
    // name = ?value, ...
    ($field:ident = ? $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__log_fields_noop!($($rest)*); }
    };
    // name = value, ...
    ($field:ident = $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__log_fields_noop!($($rest)*); }
    };
    // message literal, with or without inline captures
    ($lit:literal $($rest:tt)*) => {
        $crate::__log_fields_noop!($($rest)*)
    };
    () => {};
}
