//! Domain-separated SHA-256 hashing and tree index arithmetic.

use sha2::{Digest, Sha256};

/// 32-byte hash
pub type Hash32 = [u8; 32];

const DOMAIN_LEAF: u8 = 0x00;
const DOMAIN_BRANCH: u8 = 0x01;

/// Root of a tree with no leaves: H() over no input.
pub fn empty_root() -> Hash32 {
    Sha256::digest([]).into()
}

/// leaf = H(0x00 || data)
pub fn leaf_hash(data: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update([DOMAIN_LEAF]);
    hasher.update(data);
    hasher.finalize().into()
}

/// branch = H(0x01 || left || right)
pub fn branch_hash(left: &Hash32, right: &Hash32) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update([DOMAIN_BRANCH]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Plain SHA-256, used for map keys and values.
pub fn sha256(data: &[u8]) -> Hash32 {
    Sha256::digest(data).into()
}

pub fn is_right_child(node: u64) -> bool {
    node % 2 == 1
}

pub fn parent(node: u64) -> u64 {
    node / 2
}

pub fn sibling(node: u64) -> u64 {
    if is_right_child(node) {
        node - 1
    } else {
        node + 1
    }
}

/// Largest power of two strictly less than `n`. Zero for `n <= 1`.
pub fn split_point(n: u64) -> u64 {
    if n <= 1 {
        0
    } else {
        1 << (63 - (n - 1).leading_zeros())
    }
}

/// Number of complete nodes at `level` in a tree of `tree_size` leaves.
pub fn level_size(tree_size: u64, level: u32) -> u64 {
    if level >= 64 {
        0
    } else {
        tree_size >> level
    }
}

/// Number of levels holding at least one node.
pub fn level_count(tree_size: u64) -> u32 {
    if tree_size == 0 {
        1
    } else {
        64 - tree_size.leading_zeros()
    }
}
