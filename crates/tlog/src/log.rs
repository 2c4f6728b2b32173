//! Append-only Merkle log kept as one hash array per level.
//!
//! Level `k` holds the hashes of every complete subtree of `2^k` leaves, so a
//! tree of `n` leaves has `n >> k` nodes at level `k`. Nodes are stored in
//! bucket `log-<level>` under their decimal index.

use crate::hash::{
    branch_hash, empty_root, is_right_child, leaf_hash, level_count, level_size, parent, sibling,
    Hash32,
};
use crate::leaf::Leaf;
use crate::storage::Transaction;
use crate::{Result, TlogError};

pub type AuditProof = Vec<Hash32>;
pub type ConsistencyProof = Vec<Hash32>;

/// View of the log at `tree_size`. The struct holds no locks; callers run it
/// inside a storage transaction.
#[derive(Clone, Copy, Debug)]
pub struct VerifiableLog {
    tree_size: u64,
}

fn bucket(level: u32) -> String {
    format!("log-{level}")
}

impl VerifiableLog {
    pub fn new(tree_size: u64) -> Self {
        Self { tree_size }
    }

    pub fn tree_size(&self) -> u64 {
        self.tree_size
    }

    fn node(&self, txn: &dyn Transaction, level: u32, index: u64) -> Result<Leaf> {
        let raw = txn.get(&bucket(level), index.to_string().as_bytes())?;
        Leaf::decode(&raw)
    }

    fn digest(&self, txn: &dyn Transaction, level: u32, index: u64) -> Result<Hash32> {
        let leaf = self.node(txn, level, index)?;
        leaf.digest
            .as_slice()
            .try_into()
            .map_err(|_| TlogError::MalformedRecord(format!("node {level}/{index} digest length")))
    }

    fn put(&self, txn: &mut dyn Transaction, level: u32, index: u64, leaf: &Leaf) -> Result<()> {
        txn.set(&bucket(level), index.to_string().as_bytes(), &leaf.encode()?)
    }

    /// Appends `data` as a new leaf and returns its index.
    pub fn append(&mut self, txn: &mut dyn Transaction, data: &[u8]) -> Result<u64> {
        let index = self.tree_size;
        let mut hash = leaf_hash(data);
        self.put(txn, 0, index, &Leaf::new(hash.to_vec(), data.to_vec())?)?;

        let mut level = 0u32;
        let mut node = index;
        while is_right_child(node) {
            let left = self.digest(txn, level, node - 1)?;
            hash = branch_hash(&left, &hash);
            level += 1;
            node = parent(node);
            self.put(txn, level, node, &Leaf::new(hash.to_vec(), Vec::new())?)?;
        }

        self.tree_size += 1;
        Ok(index)
    }

    /// Raw data of the leaf at `index`.
    pub fn leaf(&self, txn: &dyn Transaction, index: u64) -> Result<Vec<u8>> {
        if index >= self.tree_size {
            return Err(TlogError::OutOfRange(format!(
                "leaf {index} beyond tree size {}",
                self.tree_size
            )));
        }
        Ok(self.node(txn, 0, index)?.value)
    }

    pub fn root(&self, txn: &dyn Transaction) -> Result<Hash32> {
        self.root_at(txn, self.tree_size)
    }

    /// Root of the tree formed by the first `size` leaves.
    pub fn root_at(&self, txn: &dyn Transaction, size: u64) -> Result<Hash32> {
        self.check_size(size)?;
        if size == 0 {
            return Ok(empty_root());
        }

        let levels = level_count(size);
        let mut level = 0u32;
        while level_size(size, level) % 2 == 0 {
            level += 1;
        }
        let mut hash = self.digest(txn, level, level_size(size, level) - 1)?;
        for upper in level + 1..levels {
            let n = level_size(size, upper);
            if n % 2 == 1 {
                hash = branch_hash(&self.digest(txn, upper, n - 1)?, &hash);
            }
        }
        Ok(hash)
    }

    /// Sibling path proving leaf `index` is in the tree of `size` leaves.
    pub fn audit_proof(&self, txn: &dyn Transaction, index: u64, size: u64) -> Result<AuditProof> {
        self.check_size(size)?;
        if size == 0 {
            return Ok(Vec::new());
        }
        if index >= size {
            return Err(TlogError::OutOfRange(format!(
                "leaf {index} not in tree of size {size}"
            )));
        }
        self.path_to_root(txn, index, 0, size)
    }

    /// Proof that the tree of `first` leaves is a prefix of the tree of
    /// `second` leaves.
    pub fn consistency_proof(
        &self,
        txn: &dyn Transaction,
        first: u64,
        second: u64,
    ) -> Result<ConsistencyProof> {
        self.check_size(second)?;
        if first > second {
            return Err(TlogError::OutOfRange(format!(
                "first size {first} exceeds second size {second}"
            )));
        }
        if first == 0 || first == second {
            return Ok(Vec::new());
        }

        // Highest complete subtree ending at the old boundary.
        let mut node = first - 1;
        let mut level = 0u32;
        while is_right_child(node) {
            node = parent(node);
            level += 1;
        }

        let mut proof = Vec::new();
        if node > 0 {
            proof.push(self.digest(txn, level, node)?);
        }
        proof.extend(self.path_to_root(txn, node, level, second)?);
        Ok(proof)
    }

    /// Path from `node` at `level` to the root of the tree of `snapshot`
    /// leaves. `last_hash` tracks the rightmost node of the current level
    /// at the snapshot, which may cover an incomplete subtree.
    fn path_to_root(
        &self,
        txn: &dyn Transaction,
        mut node: u64,
        mut level: u32,
        snapshot: u64,
    ) -> Result<Vec<Hash32>> {
        let mut path = Vec::new();
        if snapshot == 0 {
            return Ok(path);
        }

        let mut last_node = snapshot - 1;
        let mut last_hash = self.digest(txn, 0, last_node)?;
        for i in 0..level {
            if is_right_child(last_node) {
                last_hash = branch_hash(&self.digest(txn, i, last_node - 1)?, &last_hash);
            }
            last_node = parent(last_node);
        }

        while last_node > 0 {
            let sib = sibling(node);
            if sib < last_node {
                path.push(self.digest(txn, level, sib)?);
            } else if sib == last_node {
                path.push(last_hash);
            }

            if is_right_child(last_node) {
                last_hash = branch_hash(&self.digest(txn, level, last_node - 1)?, &last_hash);
            }
            level += 1;
            node = parent(node);
            last_node = parent(last_node);
        }

        Ok(path)
    }

    fn check_size(&self, size: u64) -> Result<()> {
        if size > self.tree_size {
            return Err(TlogError::OutOfRange(format!(
                "size {size} beyond tree size {}",
                self.tree_size
            )));
        }
        Ok(())
    }
}
