//! Client-side trust in one peer log's signed tree head.
//!
//! A candidate head replaces the trusted one only when it is signed by the
//! log's key and is either identical to it or linked to it by a valid
//! consistency proof. Anything else leaves the trusted head in place.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tlog::{verify_consistency_proof, LogSigner, SignedTreeHead, Storage, TlogError, HEAD};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::exec::run_blocking;
use crate::{ApiError, CacheError, LogApi};

pub const DEFAULT_REFRESH: Duration = Duration::from_secs(10);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// The last head a peer has proven, and when that happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedSth {
    pub sth: SignedTreeHead,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// First head accepted on signature alone.
    Initialized { tree_size: u64 },
    Unchanged { tree_size: u64 },
    Advanced { from: u64, to: u64 },
}

pub struct SthCache<S: Storage> {
    log_name: String,
    api: Arc<dyn LogApi>,
    verifier: Arc<dyn LogSigner>,
    store: Arc<S>,
    call_timeout: Duration,
    trusted: Arc<RwLock<Option<CachedSth>>>,
    refreshing: Mutex<()>,
}

impl<S: Storage + 'static> SthCache<S> {
    /// Restores any head previously trusted for `log_name` from `store`.
    pub fn open(
        log_name: impl Into<String>,
        api: Arc<dyn LogApi>,
        verifier: Arc<dyn LogSigner>,
        store: S,
    ) -> Result<Self, CacheError> {
        let log_name = log_name.into();
        let persisted = match store.view(|txn| txn.get(&log_name, HEAD)) {
            Ok(raw) => {
                let cached: CachedSth = bincode::deserialize(&raw)
                    .map_err(|e| TlogError::Serialization(e.to_string()))?;
                if !cached.sth.verify(verifier.as_ref()) {
                    return Err(CacheError::BadSignature);
                }
                debug!(log_name = %log_name, tree_size = cached.sth.tree_size, "sth_cache: restored");
                Some(cached)
            }
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            log_name,
            api,
            verifier,
            store: Arc::new(store),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            trusted: Arc::new(RwLock::new(persisted)),
            refreshing: Mutex::new(()),
        })
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    pub fn api(&self) -> &Arc<dyn LogApi> {
        &self.api
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn current(&self) -> Option<CachedSth> {
        self.trusted.read().ok().and_then(|t| t.clone())
    }

    pub fn sth(&self) -> Option<SignedTreeHead> {
        self.current().map(|c| c.sth)
    }

    async fn call<T>(&self, fut: impl Future<Output = Result<T, ApiError>>) -> Result<T, CacheError> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(res) => res.map_err(CacheError::from),
            Err(_) => Err(CacheError::Api(ApiError::Timeout)),
        }
    }

    /// Fetches the peer's current head and adopts it if it checks out.
    pub async fn refresh(&self) -> Result<RefreshOutcome, CacheError> {
        let _serial = self.refreshing.lock().await;

        let candidate = self.call(self.api.get_sth()).await?;
        let outcome = match self.sth() {
            None => {
                if !candidate.verify(self.verifier.as_ref()) {
                    return Err(CacheError::BadSignature);
                }
                RefreshOutcome::Initialized { tree_size: candidate.tree_size }
            }
            Some(old) if candidate.tree_size < old.tree_size => {
                return Err(CacheError::Regression { trusted: old.tree_size, candidate: candidate.tree_size });
            }
            Some(old) if candidate.tree_size == old.tree_size => {
                if !candidate.same_head(&old) {
                    return Err(CacheError::Fork { tree_size: old.tree_size });
                }
                RefreshOutcome::Unchanged { tree_size: old.tree_size }
            }
            Some(old) => {
                if !candidate.verify(self.verifier.as_ref()) {
                    return Err(CacheError::BadSignature);
                }
                let proof = self
                    .call(self.api.get_log_consistency_proof(old.tree_size, candidate.tree_size))
                    .await?;
                if !verify_consistency_proof(
                    &old.log_root,
                    &candidate.log_root,
                    old.tree_size,
                    candidate.tree_size,
                    &proof,
                ) {
                    return Err(CacheError::InconsistentProof { from: old.tree_size, to: candidate.tree_size });
                }
                RefreshOutcome::Advanced { from: old.tree_size, to: candidate.tree_size }
            }
        };

        self.adopt(CachedSth { sth: candidate, refreshed_at: Utc::now() }).await?;
        Ok(outcome)
    }

    /// Persists and installs `cached` in one blocking task, so a cancelled
    /// refresh either adopts fully or not at all.
    async fn adopt(&self, cached: CachedSth) -> Result<(), CacheError> {
        let store = self.store.clone();
        let trusted = self.trusted.clone();
        let log_name = self.log_name.clone();
        run_blocking(move || {
            let raw = bincode::serialize(&cached).map_err(|e| TlogError::Serialization(e.to_string()))?;
            store.update(|txn| txn.set(&log_name, HEAD, &raw))?;
            let mut trusted = trusted
                .write()
                .map_err(|_| TlogError::Storage("sth cache lock poisoned".into()))?;
            *trusted = Some(cached);
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Starts a refresh loop ticking every `every`; `trigger` on the handle
    /// forces an early refresh.
    pub fn spawn(self: Arc<Self>, every: Duration) -> RefreshHandle {
        let cancel = CancellationToken::new();
        let wake = Arc::new(Notify::new());
        let task = tokio::spawn(run_refresh_loop(self, every, cancel.clone(), wake.clone()));
        RefreshHandle { cancel, wake, task }
    }
}

async fn run_refresh_loop<S: Storage + 'static>(
    cache: Arc<SthCache<S>>,
    every: Duration,
    cancel: CancellationToken,
    wake: Arc<Notify>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(log_name = %cache.log_name, every_secs = every.as_secs(), "sth_cache: started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
            _ = wake.notified() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            res = cache.refresh() => res,
        };

        match result {
            Ok(RefreshOutcome::Advanced { from, to }) => {
                info!(log_name = %cache.log_name, old_tree_size = from, tree_size = to, "sth_cache: advanced");
            }
            Ok(RefreshOutcome::Initialized { tree_size }) => {
                info!(log_name = %cache.log_name, tree_size, "sth_cache: trusted first head");
            }
            Ok(RefreshOutcome::Unchanged { tree_size }) => {
                debug!(log_name = %cache.log_name, tree_size, "sth_cache: unchanged");
            }
            Err(e) => {
                error!(log_name = %cache.log_name, error = %e, "sth_cache: refresh failed, keeping trusted head");
            }
        }
    }

    info!(log_name = %cache.log_name, "sth_cache: stopped");
}

/// Controls one running refresh loop.
pub struct RefreshHandle {
    cancel: CancellationToken,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Requests a refresh now instead of at the next tick.
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the loop and waits for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("sth_cache: refresh task ended abnormally: {e}");
        }
    }
}
