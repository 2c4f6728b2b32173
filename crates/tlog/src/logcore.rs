//! The authoritative log: Merkle log plus sparse map, one signed head per
//! committed batch.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::leaf::Record;
use crate::log::{AuditProof, ConsistencyProof, VerifiableLog};
use crate::signer::LogSigner;
use crate::smt::SparseMap;
use crate::storage::{Storage, Transaction};
use crate::sth::{sign_head, SignedTreeHead, HEAD, META};
use crate::types::{CompressedProof, MapEntry, MapProof};
use crate::{hash, Hash32, Result, TlogError};

pub struct LogCore<S: Storage> {
    name: String,
    store: S,
    signer: Arc<dyn LogSigner>,
    map: SparseMap,
    head: RwLock<SignedTreeHead>,
}

fn load_head(txn: &dyn Transaction) -> Result<SignedTreeHead> {
    SignedTreeHead::decode(&txn.get(META, HEAD)?)
}

impl<S: Storage> LogCore<S> {
    /// Resumes from the stored head, or signs and stores an empty genesis
    /// head when the store is new.
    pub fn open(name: impl Into<String>, store: S, signer: Arc<dyn LogSigner>) -> Result<Self> {
        let name = name.into();
        let map = SparseMap::new();

        let head = match store.view(load_head) {
            Ok(head) => {
                if !head.verify(signer.as_ref()) {
                    return Err(TlogError::BadSignature);
                }
                info!(log_name = %name, tree_size = head.tree_size, "log: resumed");
                head
            }
            Err(e) if e.is_not_found() => {
                let genesis = sign_head(signer.as_ref(), 0, hash::empty_root(), map.empty_root())?;
                store.update(|txn| txn.set(META, HEAD, &genesis.encode()?))?;
                info!(log_name = %name, "log: created");
                genesis
            }
            Err(e) => return Err(e),
        };

        Ok(Self { name, store, signer, map, head: RwLock::new(head) })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signer.public_key()
    }

    pub fn sth(&self) -> Result<SignedTreeHead> {
        self.head
            .read()
            .map(|h| h.clone())
            .map_err(|_| TlogError::Storage("head lock poisoned".into()))
    }

    /// Appends every `(key, value)` pair and the map entries for them, then
    /// signs one new head. Any key already present (or repeated in the
    /// batch) rejects the whole batch.
    pub fn submit(&self, items: &[(Vec<u8>, Vec<u8>)]) -> Result<SignedTreeHead> {
        if !self.signer.can_sign() {
            return Err(TlogError::CannotSign);
        }
        for (key, value) in items {
            Record::check_size(key, value)?;
        }

        let sth = self.store.update(|txn| {
            let head = load_head(txn)?;

            let mut seen = HashSet::new();
            for (key, _) in items {
                if !seen.insert(key.as_slice())
                    || self.map.get(txn, &head.map_root, key)?.is_some()
                {
                    return Err(TlogError::DuplicateKey(hex::encode(key)));
                }
            }

            let mut log = VerifiableLog::new(head.tree_size);
            let mut map_root = head.map_root;
            for (key, value) in items {
                let record = Record { key: key.clone(), value: value.clone() };
                let index = log.append(txn, &record.encode()?)?;
                let entry = MapEntry { value: value.clone(), index };
                map_root = self.map.update(txn, &map_root, key, &entry.encode()?)?;
            }

            let log_root = log.root(txn)?;
            let sth = sign_head(self.signer.as_ref(), log.tree_size(), log_root, map_root)?;
            txn.set(META, HEAD, &sth.encode()?)?;
            Ok(sth)
        })?;

        let mut head = self
            .head
            .write()
            .map_err(|_| TlogError::Storage("head lock poisoned".into()))?;
        if sth.tree_size >= head.tree_size {
            *head = sth.clone();
        }
        info!(log_name = %self.name, tree_size = sth.tree_size, items = items.len(), "log: batch committed");
        Ok(sth)
    }

    pub fn consistency_proof(&self, first: u64, second: u64) -> Result<ConsistencyProof> {
        self.store.view(|txn| {
            let log = VerifiableLog::new(load_head(txn)?.tree_size);
            log.consistency_proof(txn, first, second)
        })
    }

    pub fn audit_proof(&self, index: u64, tree_size: u64) -> Result<AuditProof> {
        self.store.view(|txn| {
            let log = VerifiableLog::new(load_head(txn)?.tree_size);
            log.audit_proof(txn, index, tree_size)
        })
    }

    /// Raw leaf data for indices `start..=finish`.
    pub fn entries(&self, start: u64, finish: u64) -> Result<Vec<Vec<u8>>> {
        if start > finish {
            return Err(TlogError::OutOfRange(format!("start {start} after finish {finish}")));
        }
        self.store.view(|txn| {
            let log = VerifiableLog::new(load_head(txn)?.tree_size);
            (start..=finish).map(|i| log.leaf(txn, i)).collect()
        })
    }

    /// Decoded records for indices `start..=finish`.
    pub fn records(&self, start: u64, finish: u64) -> Result<Vec<Record>> {
        self.entries(start, finish)?
            .iter()
            .map(|raw| Record::decode(raw))
            .collect()
    }

    pub fn root_at(&self, tree_size: u64) -> Result<Hash32> {
        self.store.view(|txn| {
            let log = VerifiableLog::new(load_head(txn)?.tree_size);
            log.root_at(txn, tree_size)
        })
    }

    /// Map value for `key` under `map_root`, with its inclusion (or
    /// absence) proof.
    pub fn map_value(&self, key: &[u8], map_root: &Hash32) -> Result<(Option<Vec<u8>>, MapProof)> {
        self.store.view(|txn| {
            let value = self.map.get(txn, map_root, key)?;
            let proof = self.map.prove(txn, map_root, key)?;
            Ok((value, proof))
        })
    }

    pub fn compress_proof(&self, proof: &MapProof) -> CompressedProof {
        self.map.compress_proof(proof)
    }

    pub fn decompress_proof(&self, compressed: &CompressedProof) -> Result<MapProof> {
        self.map.decompress_proof(compressed)
    }

    /// Verified map entry for `key` at the current head.
    pub fn query(&self, key: &[u8]) -> Result<Option<MapEntry>> {
        let head = self.sth()?;
        let (value, proof) = self.map_value(key, &head.map_root)?;
        if !SparseMap::verify_proof(&proof, &head.map_root, key, value.as_deref()) {
            return Err(TlogError::InvalidProof);
        }
        debug!(log_name = %self.name, found = value.is_some(), "log: query");
        value.map(|v| MapEntry::decode(&v)).transpose()
    }
}
