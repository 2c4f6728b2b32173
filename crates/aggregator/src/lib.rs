//! Querying side of the log network: per-peer trusted heads and
//! cross-log decisions.

mod exec;
pub mod api;
pub mod cache;
pub mod manager;
pub mod aggregate;

pub use api::{LocalLog, LogApi, MapValue};
pub use cache::{CachedSth, RefreshHandle, RefreshOutcome, SthCache, DEFAULT_CALL_TIMEOUT, DEFAULT_REFRESH};
pub use manager::SthManager;
pub use aggregate::Aggregator;

use thiserror::Error;
use tlog::TlogError;

/// Failure talking to a log.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("log error: {0}")]
    Log(#[from] TlogError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("task failed: {0}")]
    Task(String),
}

/// Why a candidate head was not adopted.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("tree size regressed from {trusted} to {candidate}")]
    Regression { trusted: u64, candidate: u64 },

    #[error("conflicting head at tree size {tree_size}")]
    Fork { tree_size: u64 },

    #[error("bad signature on candidate head")]
    BadSignature,

    #[error("consistency proof from {from} to {to} does not verify")]
    InconsistentProof { from: u64, to: u64 },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("storage error: {0}")]
    Storage(#[from] TlogError),
}

/// Why one log contributed no answer to a query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no trusted head yet")]
    NoTrustedHead,

    #[error("map proof does not verify")]
    InvalidProof,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("malformed response: {0}")]
    Malformed(#[from] TlogError),
}
