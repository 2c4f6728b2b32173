//! Signed tree heads

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::signer::LogSigner;
use crate::{Hash32, Result, TlogError};

/// Bucket and key of the current head.
pub const META: &str = "META";
pub const HEAD: &[u8] = b"HEAD";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedTreeHead {
    pub tree_size: u64,
    pub log_root: Hash32,
    pub map_root: Hash32,
    pub signature: Vec<u8>,
}

/// SHA-256(tree_size as big-endian u64 || log_root || map_root)
pub fn sth_digest(tree_size: u64, log_root: &Hash32, map_root: &Hash32) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(tree_size.to_be_bytes());
    hasher.update(log_root);
    hasher.update(map_root);
    hasher.finalize().into()
}

pub fn sign_head(
    signer: &dyn LogSigner,
    tree_size: u64,
    log_root: Hash32,
    map_root: Hash32,
) -> Result<SignedTreeHead> {
    let signature = signer.sign(&sth_digest(tree_size, &log_root, &map_root))?;
    Ok(SignedTreeHead { tree_size, log_root, map_root, signature })
}

impl SignedTreeHead {
    pub fn digest(&self) -> Hash32 {
        sth_digest(self.tree_size, &self.log_root, &self.map_root)
    }

    pub fn verify(&self, signer: &dyn LogSigner) -> bool {
        signer.verify(&self.digest(), &self.signature)
    }

    /// True when every field, signature included, is byte-identical.
    pub fn same_head(&self, other: &SignedTreeHead) -> bool {
        self == other
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| TlogError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| TlogError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Ed25519Signer;

    #[test]
    fn test_signature_covers_every_field() {
        let signer = Ed25519Signer::generate();
        let sth = sign_head(&signer, 5, [1u8; 32], [2u8; 32]).unwrap();
        assert!(sth.verify(&signer));

        let mut bigger = sth.clone();
        bigger.tree_size = 6;
        assert!(!bigger.verify(&signer));

        let mut other_log = sth.clone();
        other_log.log_root[0] ^= 1;
        assert!(!other_log.verify(&signer));

        let mut other_map = sth.clone();
        other_map.map_root[31] ^= 1;
        assert!(!other_map.verify(&signer));
    }

    #[test]
    fn test_encoding() {
        let signer = Ed25519Signer::generate();
        let sth = sign_head(&signer, 9, [3u8; 32], [4u8; 32]).unwrap();
        let decoded = SignedTreeHead::decode(&sth.encode().unwrap()).unwrap();
        assert!(decoded.same_head(&sth));
        assert!(SignedTreeHead::decode(&[1, 2, 3]).is_err());
    }
}
