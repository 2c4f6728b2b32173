use std::sync::Arc;

use tlog::{LogCore, Storage};

use crate::ApiError;

/// Runs a storage-bound call against `core` off the async executor.
pub async fn with_core_blocking<S, R, F>(core: Arc<LogCore<S>>, f: F) -> Result<R, ApiError>
where
    S: Storage + 'static,
    R: Send + 'static,
    F: FnOnce(&LogCore<S>) -> tlog::Result<R> + Send + 'static,
{
    run_blocking(move || f(&core)).await
}

/// Runs storage-bound work on the blocking pool. Once started it runs to
/// completion even if the caller is dropped.
pub async fn run_blocking<R, F>(f: F) -> Result<R, ApiError>
where
    R: Send + 'static,
    F: FnOnce() -> tlog::Result<R> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Task(e.to_string()))?
        .map_err(ApiError::from)
}
