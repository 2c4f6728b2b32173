//! Stateless verification of audit and consistency proofs.

use crate::hash::{branch_hash, leaf_hash, split_point, Hash32};

/// Recomputes the root from `leaf_data` at `index` and the sibling path.
/// Every proof element must be consumed.
pub fn verify_audit_proof(
    root: &Hash32,
    tree_size: u64,
    index: u64,
    proof: &[Hash32],
    leaf_data: &[u8],
) -> bool {
    if index >= tree_size {
        return false;
    }

    let mut hash = leaf_hash(leaf_data);
    let mut idx = index;
    let mut size = tree_size;
    let mut elements = proof.iter();

    while size > 1 {
        // A rightmost even node has no sibling yet and moves up unchanged.
        let promoted = idx % 2 == 0 && idx + 1 == size;
        if !promoted {
            let Some(sibling) = elements.next() else {
                return false;
            };
            hash = if idx % 2 == 1 {
                branch_hash(sibling, &hash)
            } else {
                branch_hash(&hash, sibling)
            };
        }
        idx /= 2;
        size = size / 2 + size % 2;
    }

    elements.next().is_none() && hash == *root
}

/// Checks that `old_root` at `old_size` is a prefix of `new_root` at
/// `new_size`.
pub fn verify_consistency_proof(
    old_root: &Hash32,
    new_root: &Hash32,
    old_size: u64,
    new_size: u64,
    proof: &[Hash32],
) -> bool {
    if old_size == 0 {
        return true;
    }
    if old_size > new_size {
        return false;
    }
    if old_size == new_size {
        return old_root == new_root;
    }

    match subproof_roots(old_root, old_size, new_size, proof, true) {
        Some((old, new, rest)) => rest.is_empty() && old == *old_root && new == *new_root,
        None => false,
    }
}

/// Mirrors proof construction for the subtree of `n` leaves whose first `m`
/// leaves belong to the old tree. Elements are taken from the end of the
/// proof, so the outermost split is resolved first. Returns the implied old
/// and new subtree hashes plus the unconsumed prefix.
fn subproof_roots<'p>(
    old_root: &Hash32,
    m: u64,
    n: u64,
    proof: &'p [Hash32],
    whole_old_tree: bool,
) -> Option<(Hash32, Hash32, &'p [Hash32])> {
    if m == n {
        if whole_old_tree {
            return Some((*old_root, *old_root, proof));
        }
        let (last, rest) = proof.split_last()?;
        return Some((*last, *last, rest));
    }

    let k = split_point(n);
    let (next, rest) = proof.split_last()?;
    if m <= k {
        let (old, new, rest) = subproof_roots(old_root, m, k, rest, whole_old_tree)?;
        Some((old, branch_hash(&new, next), rest))
    } else {
        let (old, new, rest) = subproof_roots(old_root, m - k, n - k, rest, false)?;
        Some((branch_hash(next, &old), branch_hash(next, &new), rest))
    }
}
