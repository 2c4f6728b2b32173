//! Sparse Merkle map over SHA-256(key), 256 levels deep.
//!
//! leaf = H(0x00 || H(value)), empty leaf = H(0x00 || 0^32),
//! node = H(0x01 || left || right). Siblings are ordered leaf to root.

use crate::hash::{branch_hash, leaf_hash, sha256, Hash32};
use crate::nodestore;
use crate::storage::Transaction;
use crate::types::{CompressedProof, MapProof};
use crate::{Result, TlogError};

const DEPTH: usize = 256;

/// Canonical "empty value hash"
fn empty_value_hash() -> Hash32 {
    [0u8; 32]
}

#[derive(Clone, Debug)]
pub struct SparseMap {
    default_hashes: Vec<Hash32>,
}

impl Default for SparseMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseMap {
    pub fn new() -> Self {
        Self { default_hashes: compute_default_hashes() }
    }

    /// Root of a map holding no keys.
    pub fn empty_root(&self) -> Hash32 {
        self.default_hashes[DEPTH]
    }

    pub fn default_hashes(&self) -> &[Hash32] {
        &self.default_hashes
    }

    fn children(&self, txn: &dyn Transaction, height: usize, hash: &Hash32) -> Result<(Hash32, Hash32)> {
        if *hash == self.default_hashes[height] {
            let d = self.default_hashes[height - 1];
            return Ok((d, d));
        }
        nodestore::children(txn, hash)
    }

    /// Walks from `root` to the leaf of `key_hash`, returning the siblings
    /// (leaf to root) and the leaf hash.
    fn descend(&self, txn: &dyn Transaction, root: &Hash32, key_hash: &Hash32) -> Result<(Vec<Hash32>, Hash32)> {
        let mut siblings = vec![[0u8; 32]; DEPTH];
        let mut current = *root;
        for h in (0..DEPTH).rev() {
            let (left, right) = self.children(txn, h + 1, &current)?;
            if bit_at_lsb(key_hash, h) {
                siblings[h] = left;
                current = right;
            } else {
                siblings[h] = right;
                current = left;
            }
        }
        Ok((siblings, current))
    }

    /// Value stored under `key` in the map with root `root`.
    pub fn get(&self, txn: &dyn Transaction, root: &Hash32, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let (_, leaf) = self.descend(txn, root, &sha256(key))?;
        if leaf == self.default_hashes[0] {
            return Ok(None);
        }
        nodestore::leaf_value(txn, &leaf).map(Some)
    }

    pub fn prove(&self, txn: &dyn Transaction, root: &Hash32, key: &[u8]) -> Result<MapProof> {
        let (siblings, _) = self.descend(txn, root, &sha256(key))?;
        Ok(MapProof { siblings })
    }

    /// Sets `key` to `value` on top of `root` and returns the new root.
    /// Nodes reachable from `root` are left untouched.
    pub fn update(&self, txn: &mut dyn Transaction, root: &Hash32, key: &[u8], value: &[u8]) -> Result<Hash32> {
        let key_hash = sha256(key);
        let (siblings, _) = self.descend(txn, root, &key_hash)?;

        let value_hash = sha256(value);
        let mut current = leaf_hash(&value_hash);
        nodestore::put_leaf(txn, &current, &value_hash, value)?;

        for (h, sibling) in siblings.iter().enumerate() {
            let (left, right) = if bit_at_lsb(&key_hash, h) {
                (*sibling, current)
            } else {
                (current, *sibling)
            };
            let parent = branch_hash(&left, &right);
            if parent != self.default_hashes[h + 1] {
                nodestore::put_node(txn, &parent, &left, &right)?;
            }
            current = parent;
        }
        Ok(current)
    }

    /// Checks `proof` for `key` holding `value` (or nothing, for `None`).
    pub fn verify_proof(proof: &MapProof, root: &Hash32, key: &[u8], value: Option<&[u8]>) -> bool {
        if proof.siblings.len() != DEPTH {
            return false;
        }
        let key_hash = sha256(key);
        let value_hash = match value {
            Some(v) => sha256(v),
            None => empty_value_hash(),
        };
        let mut current = leaf_hash(&value_hash);
        for (h, sibling) in proof.siblings.iter().enumerate() {
            current = if bit_at_lsb(&key_hash, h) {
                branch_hash(sibling, &current)
            } else {
                branch_hash(&current, sibling)
            };
        }
        current == *root
    }

    // ---------------- Proof Compression Helpers ---------------- //

    pub fn compress_proof(&self, proof: &MapProof) -> CompressedProof {
        let mut bitmap = vec![0u8; DEPTH / 8];
        let mut siblings = Vec::new();

        for (i, sibling) in proof.siblings.iter().enumerate().take(DEPTH) {
            if *sibling != self.default_hashes[i] {
                bitmap[i / 8] |= 1 << (i % 8);
                siblings.push(*sibling);
            }
        }

        CompressedProof { depth: DEPTH as u16, bitmap, siblings }
    }

    pub fn decompress_proof(&self, compressed: &CompressedProof) -> Result<MapProof> {
        if compressed.depth as usize != DEPTH || compressed.bitmap.len() != DEPTH / 8 {
            return Err(TlogError::InvalidProof);
        }

        let mut full_siblings = Vec::with_capacity(DEPTH);
        let mut sib_iter = compressed.siblings.iter();

        for i in 0..DEPTH {
            let is_present = (compressed.bitmap[i / 8] >> (i % 8)) & 1 == 1;
            if is_present {
                match sib_iter.next() {
                    Some(s) => full_siblings.push(*s),
                    None => return Err(TlogError::InvalidProof),
                }
            } else {
                full_siblings.push(self.default_hashes[i]);
            }
        }

        if sib_iter.next().is_some() {
            return Err(TlogError::InvalidProof); // Too many siblings
        }

        Ok(MapProof { siblings: full_siblings })
    }
}

fn compute_default_hashes() -> Vec<Hash32> {
    let mut defaults = Vec::with_capacity(DEPTH + 1);
    defaults.push(leaf_hash(&empty_value_hash()));
    for h in 0..DEPTH {
        let prev = defaults[h];
        defaults.push(branch_hash(&prev, &prev));
    }
    defaults
}

fn bit_at_lsb(key: &Hash32, h: usize) -> bool {
    let byte_index = 31 - (h / 8);
    let bit_index = h % 8;
    ((key[byte_index] >> bit_index) & 1) == 1
}
