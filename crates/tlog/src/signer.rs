//! Ed25519 signing for tree heads

use std::path::Path;

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand_core::OsRng;

use crate::{Result, TlogError};

pub trait LogSigner: Send + Sync {
    fn sign(&self, digest: &[u8]) -> Result<Vec<u8>>;
    fn verify(&self, digest: &[u8], signature: &[u8]) -> bool;
    /// False for public-key-only configurations.
    fn can_sign(&self) -> bool;
    fn public_key(&self) -> [u8; 32];
}

pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    pub fn generate() -> Self {
        Self { signing_key: SigningKey::generate(&mut OsRng) }
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { signing_key: SigningKey::from_bytes(&seed) }
    }

    pub fn from_seed_hex(seed_hex: &str) -> Result<Self> {
        Ok(Self::from_seed(decode_key(seed_hex)?))
    }

    /// Reads a hex-encoded 32-byte seed from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| TlogError::Key(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_seed_hex(&text)
    }

    pub fn seed_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl LogSigner for Ed25519Signer {
    fn sign(&self, digest: &[u8]) -> Result<Vec<u8>> {
        Ok(self.signing_key.sign(digest).to_bytes().to_vec())
    }

    fn verify(&self, digest: &[u8], signature: &[u8]) -> bool {
        verify_with(&self.signing_key.verifying_key(), digest, signature)
    }

    fn can_sign(&self) -> bool {
        true
    }

    fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }
}

/// Verify-only signer for peer logs.
pub struct Ed25519Verifier {
    verifying_key: VerifyingKey,
}

impl Ed25519Verifier {
    pub fn from_bytes(public_key: [u8; 32]) -> Result<Self> {
        let verifying_key = VerifyingKey::from_bytes(&public_key)
            .map_err(|e| TlogError::Key(e.to_string()))?;
        Ok(Self { verifying_key })
    }

    pub fn from_hex(public_key_hex: &str) -> Result<Self> {
        Self::from_bytes(decode_key(public_key_hex)?)
    }
}

impl LogSigner for Ed25519Verifier {
    fn sign(&self, _digest: &[u8]) -> Result<Vec<u8>> {
        Err(TlogError::CannotSign)
    }

    fn verify(&self, digest: &[u8], signature: &[u8]) -> bool {
        verify_with(&self.verifying_key, digest, signature)
    }

    fn can_sign(&self) -> bool {
        false
    }

    fn public_key(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }
}

fn verify_with(key: &VerifyingKey, digest: &[u8], signature: &[u8]) -> bool {
    match Signature::from_slice(signature) {
        Ok(sig) => key.verify(digest, &sig).is_ok(),
        Err(_) => false,
    }
}

fn decode_key(text: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(text.trim()).map_err(|e| TlogError::Key(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| TlogError::Key(format!("expected 32 key bytes, got {}", b.len())))
}
