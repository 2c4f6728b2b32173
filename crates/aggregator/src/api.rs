//! Client view of a log: the calls an aggregator makes against it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tlog::{CompressedProof, Hash32, LogCore, SignedTreeHead, Storage};

use crate::exec::with_core_blocking;
use crate::ApiError;

/// A map lookup result: the raw value, if any, and its compressed proof.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    pub value: Option<Vec<u8>>,
    pub proof: CompressedProof,
}

#[async_trait]
pub trait LogApi: Send + Sync {
    async fn get_sth(&self) -> Result<SignedTreeHead, ApiError>;

    async fn get_log_consistency_proof(&self, first: u64, second: u64) -> Result<Vec<Hash32>, ApiError>;

    async fn get_log_audit_proof(&self, index: u64, tree_size: u64) -> Result<Vec<Hash32>, ApiError>;

    /// Leaf data for `start..=finish`.
    async fn get_log_entries(&self, start: u64, finish: u64) -> Result<Vec<Vec<u8>>, ApiError>;

    async fn get_map_value(&self, key: &[u8], map_root: &Hash32) -> Result<MapValue, ApiError>;

    async fn submit(&self, items: Vec<(Vec<u8>, Vec<u8>)>) -> Result<SignedTreeHead, ApiError>;
}

/// An in-process log served through `LogApi`.
pub struct LocalLog<S: Storage> {
    core: Arc<LogCore<S>>,
}

impl<S: Storage> Clone for LocalLog<S> {
    fn clone(&self) -> Self {
        Self { core: self.core.clone() }
    }
}

impl<S: Storage + 'static> LocalLog<S> {
    pub fn new(core: Arc<LogCore<S>>) -> Self {
        Self { core }
    }

    pub fn core(&self) -> &Arc<LogCore<S>> {
        &self.core
    }
}

#[async_trait]
impl<S: Storage + 'static> LogApi for LocalLog<S> {
    async fn get_sth(&self) -> Result<SignedTreeHead, ApiError> {
        Ok(self.core.sth()?)
    }

    async fn get_log_consistency_proof(&self, first: u64, second: u64) -> Result<Vec<Hash32>, ApiError> {
        with_core_blocking(self.core.clone(), move |c| c.consistency_proof(first, second)).await
    }

    async fn get_log_audit_proof(&self, index: u64, tree_size: u64) -> Result<Vec<Hash32>, ApiError> {
        with_core_blocking(self.core.clone(), move |c| c.audit_proof(index, tree_size)).await
    }

    async fn get_log_entries(&self, start: u64, finish: u64) -> Result<Vec<Vec<u8>>, ApiError> {
        with_core_blocking(self.core.clone(), move |c| c.entries(start, finish)).await
    }

    async fn get_map_value(&self, key: &[u8], map_root: &Hash32) -> Result<MapValue, ApiError> {
        let key = key.to_vec();
        let root = *map_root;
        with_core_blocking(self.core.clone(), move |c| {
            let (value, proof) = c.map_value(&key, &root)?;
            Ok(MapValue { value, proof: c.compress_proof(&proof) })
        })
        .await
    }

    async fn submit(&self, items: Vec<(Vec<u8>, Vec<u8>)>) -> Result<SignedTreeHead, ApiError> {
        with_core_blocking(self.core.clone(), move |c| c.submit(&items)).await
    }
}
