//! Sparse map proofs and the entries the map stores

use serde::{Deserialize, Serialize};

use crate::{Hash32, Result, TlogError};

/// Inclusion or absence proof for one key, siblings ordered leaf to root.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MapProof {
    pub siblings: Vec<Hash32>,
}

/// A `MapProof` with default-hash siblings elided. Bit `i` of `bitmap` is
/// set when sibling `i` is stored in `siblings`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompressedProof {
    pub depth: u16,
    pub bitmap: Vec<u8>,
    pub siblings: Vec<Hash32>,
}

/// Value stored in the map for each submitted key: the submitted value and
/// the index of the log leaf that recorded it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MapEntry {
    pub value: Vec<u8>,
    pub index: u64,
}

impl MapEntry {
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| TlogError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| TlogError::Serialization(e.to_string()))
    }
}
