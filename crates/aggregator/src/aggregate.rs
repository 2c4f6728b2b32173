//! Fans a query out to every peer log and reconciles the answers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use decider::{correlate, Correlation, DeciderInput, QuorumFailure, Strategy};
use tlog::{MapEntry, SparseMap, Storage};
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::cache::SthCache;
use crate::manager::SthManager;
use crate::{ApiError, QueryError};

pub struct Aggregator<S: Storage + 'static> {
    sths: Arc<SthManager<S>>,
    strategy: Arc<Strategy>,
    map: Arc<SparseMap>,
}

type LogAnswer = (String, Result<Option<String>, QueryError>);

impl<S: Storage + 'static> Aggregator<S> {
    pub fn new(sths: Arc<SthManager<S>>, strategy: Strategy) -> Self {
        Self { sths, strategy: Arc::new(strategy), map: Arc::new(SparseMap::new()) }
    }

    pub fn sths(&self) -> &Arc<SthManager<S>> {
        &self.sths
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Queries every log concurrently and waits for all of them. A query
    /// task that dies still yields an answer for its log.
    async fn ask_all(&self, key: &[u8]) -> Vec<LogAnswer> {
        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();
        for cache in self.sths.caches() {
            let cache = cache.clone();
            let map = self.map.clone();
            let key = key.to_vec();
            let name = cache.log_name().to_string();
            let handle = tasks.spawn(async move { query_log(&cache, &map, &key).await });
            names.insert(handle.id(), name);
        }

        let mut answers = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, answer) = match joined {
                Ok((id, answer)) => (id, answer),
                Err(e) => {
                    error!("aggregator: log query task failed: {e}");
                    (e.id(), Err(ApiError::Task(e.to_string()).into()))
                }
            };
            if let Some(name) = names.remove(&id) {
                answers.push((name, answer));
            }
        }
        answers.sort_by(|a, b| a.0.cmp(&b.0));
        answers
    }

    /// Decision for `key` across all logs. Logs that cannot answer, or whose
    /// answer does not verify, count as misses.
    pub async fn decide(&self, key: &[u8]) -> Result<Correlation, QuorumFailure> {
        let mut responses = Vec::new();
        let mut misses = Vec::new();
        for (name, answer) in self.ask_all(key).await {
            match answer {
                Ok(Some(output_hash)) => responses.push(DeciderInput { log_name: name, output_hash }),
                Ok(None) => misses.push(name),
                Err(e) => {
                    warn!(log_name = %name, error = %e, "aggregator: counting log as miss");
                    misses.push(name);
                }
            }
        }
        correlate(&self.strategy, responses, misses)
    }

    /// Every verified answer for `key`, by log name.
    pub async fn hash_map(&self, key: &[u8]) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for (name, answer) in self.ask_all(key).await {
            match answer {
                Ok(Some(output_hash)) => {
                    out.insert(name, output_hash);
                }
                Ok(None) => {}
                Err(e) => warn!(log_name = %name, error = %e, "aggregator: skipping log"),
            }
        }
        out
    }
}

/// Looks `key` up at the log's trusted map root and checks the proof.
async fn query_log<S: Storage + 'static>(
    cache: &SthCache<S>,
    map: &SparseMap,
    key: &[u8],
) -> Result<Option<String>, QueryError> {
    let sth = cache.sth().ok_or(QueryError::NoTrustedHead)?;

    let found = match tokio::time::timeout(cache.call_timeout(), cache.api().get_map_value(key, &sth.map_root)).await {
        Ok(res) => res?,
        Err(_) => return Err(ApiError::Timeout.into()),
    };

    let proof = map.decompress_proof(&found.proof)?;
    if !SparseMap::verify_proof(&proof, &sth.map_root, key, found.value.as_deref()) {
        return Err(QueryError::InvalidProof);
    }

    match found.value {
        None => Ok(None),
        Some(raw) => Ok(Some(hex::encode(MapEntry::decode(&raw)?.value))),
    }
}
