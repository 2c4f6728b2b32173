//! Transactional bucket/key storage and its implementations

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::{Result, TlogError};

type Buckets = BTreeMap<(String, Vec<u8>), Vec<u8>>;

/// Access to storage within a single `view` or `update` call.
pub trait Transaction {
    /// Missing entries are `TlogError::NotFound`.
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Vec<u8>>;
    fn set(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()>;
}

/// A store offering read snapshots and exclusive, all-or-nothing writes.
pub trait Storage: Send + Sync {
    fn view<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&dyn Transaction) -> Result<R>;

    /// Changes made by `f` are committed only if it returns `Ok`.
    fn update<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<R>;
}

fn not_found(bucket: &str, key: &[u8]) -> TlogError {
    TlogError::NotFound {
        bucket: bucket.to_string(),
        key: String::from_utf8_lossy(key).into_owned(),
    }
}

fn poisoned() -> TlogError {
    TlogError::Storage("storage lock poisoned".to_string())
}

struct ReadTxn<'a> {
    data: &'a Buckets,
}

impl Transaction for ReadTxn<'_> {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Vec<u8>> {
        self.data
            .get(&(bucket.to_string(), key.to_vec()))
            .cloned()
            .ok_or_else(|| not_found(bucket, key))
    }

    fn set(&mut self, _bucket: &str, _key: &[u8], _value: &[u8]) -> Result<()> {
        Err(TlogError::Storage("write in read-only transaction".to_string()))
    }
}

/// Reads fall through to the committed data; writes stay in `pending`.
struct WriteTxn<'a> {
    base: &'a Buckets,
    pending: Buckets,
}

impl Transaction for WriteTxn<'_> {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Vec<u8>> {
        let k = (bucket.to_string(), key.to_vec());
        self.pending
            .get(&k)
            .or_else(|| self.base.get(&k))
            .cloned()
            .ok_or_else(|| not_found(bucket, key))
    }

    fn set(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.pending
            .insert((bucket.to_string(), key.to_vec()), value.to_vec());
        Ok(())
    }
}

/// In-memory storage (for testing and ephemeral logs)
#[derive(Clone, Default)]
pub struct MemoryStorage {
    data: Arc<RwLock<Buckets>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn view<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&dyn Transaction) -> Result<R>,
    {
        let data = self.data.read().map_err(|_| poisoned())?;
        f(&ReadTxn { data: &data })
    }

    fn update<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<R>,
    {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        let mut txn = WriteTxn { base: &data, pending: Buckets::new() };
        let out = f(&mut txn)?;
        let pending = txn.pending;
        data.extend(pending);
        Ok(out)
    }
}

/// Storage persisted as a single bincode file, rewritten on every commit.
#[derive(Clone)]
pub struct FileStorage {
    path: PathBuf,
    data: Arc<RwLock<Buckets>>,
}

impl FileStorage {
    /// Opens `path`, creating an empty store if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| TlogError::Storage(e.to_string()))?;
            bincode::deserialize(&bytes).map_err(|e| TlogError::Serialization(e.to_string()))?
        } else {
            Buckets::new()
        };
        Ok(Self { path, data: Arc::new(RwLock::new(data)) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &Buckets) -> Result<()> {
        let bytes =
            bincode::serialize(data).map_err(|e| TlogError::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|e| TlogError::Storage(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| TlogError::Storage(e.to_string()))
    }
}

impl Storage for FileStorage {
    fn view<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&dyn Transaction) -> Result<R>,
    {
        let data = self.data.read().map_err(|_| poisoned())?;
        f(&ReadTxn { data: &data })
    }

    fn update<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<R>,
    {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        let mut txn = WriteTxn { base: &data, pending: Buckets::new() };
        let out = f(&mut txn)?;
        let pending = txn.pending;
        if pending.is_empty() {
            return Ok(out);
        }
        // Disk first, so a failed write leaves memory matching the file.
        let mut next = data.clone();
        next.extend(pending);
        self.persist(&next)?;
        *data = next;
        Ok(out)
    }
}
