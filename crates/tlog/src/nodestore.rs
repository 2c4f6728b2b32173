//! Content-addressed node storage for the sparse map.
//!
//! Internal nodes are keyed by their own hash, so every root ever produced
//! stays readable after later updates.

use crate::storage::Transaction;
use crate::{Hash32, Result, TlogError};

pub const NODES: &str = "smt";
pub const LEAVES: &str = "smt-leaves";
pub const VALUES: &str = "smt-values";

/// Children of the internal node `hash`, if it was ever stored.
pub fn children(txn: &dyn Transaction, hash: &Hash32) -> Result<(Hash32, Hash32)> {
    let raw = txn.get(NODES, hash)?;
    if raw.len() != 64 {
        return Err(TlogError::MalformedRecord(format!(
            "map node {} has {} bytes",
            hex::encode(hash),
            raw.len()
        )));
    }
    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&raw[..32]);
    right.copy_from_slice(&raw[32..]);
    Ok((left, right))
}

pub fn put_node(txn: &mut dyn Transaction, hash: &Hash32, left: &Hash32, right: &Hash32) -> Result<()> {
    let mut raw = Vec::with_capacity(64);
    raw.extend_from_slice(left);
    raw.extend_from_slice(right);
    txn.set(NODES, hash, &raw)
}

/// Records `leaf -> value_hash -> value`.
pub fn put_leaf(
    txn: &mut dyn Transaction,
    leaf: &Hash32,
    value_hash: &Hash32,
    value: &[u8],
) -> Result<()> {
    txn.set(LEAVES, leaf, value_hash)?;
    txn.set(VALUES, value_hash, value)
}

pub fn leaf_value(txn: &dyn Transaction, leaf: &Hash32) -> Result<Vec<u8>> {
    let value_hash = txn.get(LEAVES, leaf)?;
    txn.get(VALUES, &value_hash)
}
