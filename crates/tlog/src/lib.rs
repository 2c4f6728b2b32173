//! Verifiable transparency log
//!
//! An append-only Merkle log with audit and consistency proofs, a sparse
//! Merkle map indexing its entries by key, and signed tree heads binding
//! the two.

mod hash;
mod leaf;
mod log;
mod nodestore;
mod proof;
mod signer;
mod smt;
mod storage;
mod sth;
mod types;
mod logcore;

pub use hash::{
    branch_hash, empty_root, is_right_child, leaf_hash, level_size, parent, sha256, split_point,
    Hash32,
};
pub use leaf::{Leaf, Record, MAX_FIELD_LEN, MAX_RECORD_PAYLOAD};
pub use log::{AuditProof, ConsistencyProof, VerifiableLog};
pub use proof::{verify_audit_proof, verify_consistency_proof};
pub use signer::{Ed25519Signer, Ed25519Verifier, LogSigner};
pub use smt::SparseMap;
pub use storage::{FileStorage, MemoryStorage, Storage, Transaction};
pub use sth::{sign_head, sth_digest, SignedTreeHead, HEAD, META};
pub use types::{CompressedProof, MapEntry, MapProof};
pub use logcore::LogCore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlogError {
    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Record of {0} bytes exceeds the 65535-byte leaf limit")]
    RecordTooLarge(usize),

    #[error("Invalid proof")]
    InvalidProof,

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Bad signature")]
    BadSignature,

    #[error("Signer cannot sign")]
    CannotSign,

    #[error("Key error: {0}")]
    Key(String),

    #[error("Not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TlogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TlogError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, TlogError>;
