//! Error taxonomy for the parts of this crate that return a `Result` at all.
//!
//! Per `SPEC_FULL.md` §7, the logging path itself never raises: overflow,
//! processor failures, and persistence failures are counters plus an internal
//! diagnostic, not `Err` values. Only genuine programmer-facing lifecycle and
//! configuration mistakes are typed errors here.

use thiserror::Error;

/// Lifecycle errors from [`crate::async_sink::AsyncSink`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AsyncRuntimeError {
  #[error("async sink is already running")]
  AlreadyRunning,
  #[error("async sink has already been stopped")]
  AlreadyStopped,
  #[error("async sink queue capacity must be greater than zero")]
  InvalidCapacity,
}

/// Error returned by a caller-supplied async-sink processor.
///
/// Wraps an arbitrary boxed error so processors can return whatever error
/// type is natural for their downstream (an HTTP client error, a database
/// driver error, ...) without this crate needing to know about it.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProcessorError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

impl ProcessorError {
  pub fn new(error: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self(Box::new(error))
  }
}

/// Errors surfaced by the memory store's durable mirror.
///
/// These are logged internally (`SPEC_FULL.md` §4.5 "Failure semantics") and
/// never fail admission; they are a typed enum purely so the internal logging
/// call sites and tests can match on *why* persistence degraded.
#[derive(Debug, Error)]
pub enum PersistError {
  #[error("failed to open durable log file {path}: {source}")]
  Open {
    path: std::path::PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to append durable log record: {0}")]
  Write(#[source] std::io::Error),
  #[error("failed to encode durable log record: {0}")]
  Encode(#[source] serde_cbor::Error),
}
