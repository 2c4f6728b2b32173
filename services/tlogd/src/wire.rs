//! JSON bodies exchanged between logs. Byte fields travel as hex.

use aggregator::MapValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tlog::{CompressedProof, Hash32, SignedTreeHead};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid hex in {field}")]
    Hex { field: &'static str },

    #[error("{field} must be 32 bytes")]
    Length { field: &'static str },
}

pub fn decode_hash(field: &'static str, s: &str) -> Result<Hash32, WireError> {
    let bytes = hex::decode(s).map_err(|_| WireError::Hex { field })?;
    bytes.try_into().map_err(|_| WireError::Length { field })
}

pub fn decode_bytes(field: &'static str, s: &str) -> Result<Vec<u8>, WireError> {
    hex::decode(s).map_err(|_| WireError::Hex { field })
}

fn encode_hashes(hashes: &[Hash32]) -> Vec<String> {
    hashes.iter().map(hex::encode).collect()
}

fn decode_hashes(field: &'static str, hashes: &[String]) -> Result<Vec<Hash32>, WireError> {
    hashes.iter().map(|h| decode_hash(field, h)).collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SthDto {
    pub tree_size: u64,
    pub log_root: String,
    pub map_root: String,
    pub signature: String,
}

impl From<&SignedTreeHead> for SthDto {
    fn from(sth: &SignedTreeHead) -> Self {
        Self {
            tree_size: sth.tree_size,
            log_root: hex::encode(sth.log_root),
            map_root: hex::encode(sth.map_root),
            signature: hex::encode(&sth.signature),
        }
    }
}

impl TryFrom<SthDto> for SignedTreeHead {
    type Error = WireError;

    fn try_from(dto: SthDto) -> Result<Self, Self::Error> {
        Ok(SignedTreeHead {
            tree_size: dto.tree_size,
            log_root: decode_hash("log_root", &dto.log_root)?,
            map_root: decode_hash("map_root", &dto.map_root)?,
            signature: decode_bytes("signature", &dto.signature)?,
        })
    }
}

/// Audit or consistency path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProofDto {
    pub proof: Vec<String>,
}

impl ProofDto {
    pub fn new(proof: &[Hash32]) -> Self {
        Self { proof: encode_hashes(proof) }
    }

    pub fn into_hashes(self) -> Result<Vec<Hash32>, WireError> {
        decode_hashes("proof", &self.proof)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntriesDto {
    pub entries: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapValueDto {
    pub value: Option<String>,
    pub depth: u16,
    pub bitmap: String,
    pub siblings: Vec<String>,
}

impl From<&MapValue> for MapValueDto {
    fn from(v: &MapValue) -> Self {
        Self {
            value: v.value.as_ref().map(hex::encode),
            depth: v.proof.depth,
            bitmap: hex::encode(&v.proof.bitmap),
            siblings: encode_hashes(&v.proof.siblings),
        }
    }
}

impl TryFrom<MapValueDto> for MapValue {
    type Error = WireError;

    fn try_from(dto: MapValueDto) -> Result<Self, Self::Error> {
        let value = match dto.value {
            Some(v) => Some(decode_bytes("value", &v)?),
            None => None,
        };
        Ok(MapValue {
            value,
            proof: CompressedProof {
                depth: dto.depth,
                bitmap: decode_bytes("bitmap", &dto.bitmap)?,
                siblings: decode_hashes("siblings", &dto.siblings)?,
            },
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitItem {
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub items: Vec<SubmitItem>,
}

impl SubmitRequest {
    pub fn from_pairs(items: &[(Vec<u8>, Vec<u8>)]) -> Self {
        Self {
            items: items
                .iter()
                .map(|(k, v)| SubmitItem { key: hex::encode(k), value: hex::encode(v) })
                .collect(),
        }
    }

    pub fn into_pairs(self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, WireError> {
        self.items
            .into_iter()
            .map(|i| Ok((decode_bytes("key", &i.key)?, decode_bytes("value", &i.value)?)))
            .collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
