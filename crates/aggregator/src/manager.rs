use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tlog::{SignedTreeHead, Storage};
use tracing::{info, warn};

use crate::cache::{RefreshHandle, SthCache};

/// Owns one `SthCache` per peer log and their refresh loops.
pub struct SthManager<S: Storage + 'static> {
    caches: BTreeMap<String, Arc<SthCache<S>>>,
    handles: Mutex<BTreeMap<String, RefreshHandle>>,
}

impl<S: Storage + 'static> Default for SthManager<S> {
    fn default() -> Self {
        Self { caches: BTreeMap::new(), handles: Mutex::new(BTreeMap::new()) }
    }
}

impl<S: Storage + 'static> SthManager<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, cache: SthCache<S>) {
        let name = cache.log_name().to_string();
        if self.caches.insert(name.clone(), Arc::new(cache)).is_some() {
            warn!(log_name = %name, "sth_manager: replaced cache for duplicate log name");
        }
    }

    /// Spawns a refresh loop for every cache that is not already running.
    pub fn start(&self, every: Duration) {
        let Ok(mut handles) = self.handles.lock() else {
            warn!("sth_manager: handle lock poisoned, not starting");
            return;
        };
        for (name, cache) in &self.caches {
            if handles.contains_key(name) {
                continue;
            }
            handles.insert(name.clone(), cache.clone().spawn(every));
        }
        info!(logs = handles.len(), "sth_manager: refresh loops running");
    }

    pub fn log_names(&self) -> Vec<String> {
        self.caches.keys().cloned().collect()
    }

    pub fn caches(&self) -> impl Iterator<Item = &Arc<SthCache<S>>> {
        self.caches.values()
    }

    pub fn cache(&self, log_name: &str) -> Option<&Arc<SthCache<S>>> {
        self.caches.get(log_name)
    }

    /// The trusted head for `log_name`, if one has been established.
    pub fn get(&self, log_name: &str) -> Option<SignedTreeHead> {
        self.caches.get(log_name).and_then(|c| c.sth())
    }

    /// Requests an immediate refresh; false if no loop runs for that log.
    pub fn trigger(&self, log_name: &str) -> bool {
        match self.handles.lock() {
            Ok(handles) => match handles.get(log_name) {
                Some(h) => {
                    h.trigger();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Stops every refresh loop and waits for them to exit.
    pub async fn stop_all(&self) {
        let handles = match self.handles.lock() {
            Ok(mut h) => std::mem::take(&mut *h),
            Err(_) => return,
        };
        for (name, handle) in handles {
            handle.stop().await;
            info!(log_name = %name, "sth_manager: stopped");
        }
    }
}
