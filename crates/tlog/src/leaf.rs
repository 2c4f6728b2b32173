//! Length-prefixed binary records stored in the log.
//!
//! Each field is written as a little-endian `u16` length followed by the
//! bytes, so no field may exceed 65535 bytes.

use crate::{Result, TlogError};

pub const MAX_FIELD_LEN: usize = u16::MAX as usize;

/// Combined key and value length of a `Record`. The encoded record becomes
/// a single field of its log leaf, so the two length prefixes count too.
pub const MAX_RECORD_PAYLOAD: usize = MAX_FIELD_LEN - 4;

/// One node of the log: its hash plus, at level 0, the submitted data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaf {
    pub digest: Vec<u8>,
    pub value: Vec<u8>,
}

impl Leaf {
    pub fn new(digest: Vec<u8>, value: Vec<u8>) -> Result<Self> {
        check_len(&digest)?;
        check_len(&value)?;
        Ok(Self { digest, value })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_fields(&[&self.digest, &self.value])
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut fields = decode_fields::<2>(data)?.into_iter();
        Ok(Self {
            digest: fields.next().unwrap_or_default(),
            value: fields.next().unwrap_or_default(),
        })
    }
}

/// A submitted `key -> value` pair, as appended to the log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Record {
    /// Rejects a pair whose encoded record would not fit in one leaf.
    pub fn check_size(key: &[u8], value: &[u8]) -> Result<()> {
        let payload = key.len() + value.len();
        if payload > MAX_RECORD_PAYLOAD {
            return Err(TlogError::RecordTooLarge(payload + 4));
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_fields(&[&self.key, &self.value])
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut fields = decode_fields::<2>(data)?.into_iter();
        Ok(Self {
            key: fields.next().unwrap_or_default(),
            value: fields.next().unwrap_or_default(),
        })
    }
}

fn check_len(field: &[u8]) -> Result<()> {
    if field.len() > MAX_FIELD_LEN {
        return Err(TlogError::RecordTooLarge(field.len()));
    }
    Ok(())
}

fn encode_fields(fields: &[&[u8]]) -> Result<Vec<u8>> {
    let total: usize = fields.iter().map(|f| 2 + f.len()).sum();
    let mut out = Vec::with_capacity(total);
    for field in fields {
        check_len(field)?;
        out.extend_from_slice(&(field.len() as u16).to_le_bytes());
        out.extend_from_slice(field);
    }
    Ok(out)
}

fn decode_fields<const N: usize>(data: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut fields = Vec::with_capacity(N);
    let mut offset = 0usize;
    for i in 0..N {
        let len_bytes = data
            .get(offset..offset + 2)
            .ok_or_else(|| TlogError::MalformedRecord(format!("missing length of field {i}")))?;
        let len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
        offset += 2;
        let field = data
            .get(offset..offset + len)
            .ok_or_else(|| TlogError::MalformedRecord(format!("field {i} truncated")))?;
        fields.push(field.to_vec());
        offset += len;
    }
    if offset != data.len() {
        return Err(TlogError::MalformedRecord(format!(
            "{} trailing bytes",
            data.len() - offset
        )));
    }
    Ok(fields)
}
