//! HMAC authentication of submit requests.
//!
//! The caller signs `"{timestamp}.{body}"` with the shared secret and sends
//! the timestamp in `X-Timestamp` and the hex MAC in `X-Signature`.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

pub const TIMESTAMP_HEADER: &str = "X-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Seconds a request timestamp may differ from local time.
pub const MAX_SKEW_SECS: u64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing {0} header")]
    Missing(&'static str),

    #[error("malformed {0} header")]
    Malformed(&'static str),

    #[error("request timestamp outside the allowed window")]
    Stale,

    #[error("signature mismatch")]
    Mismatch,
}

fn mac_for(secret: &str, ts: i64, body: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take any key length");
    mac.update(ts.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    mac
}

pub fn sign_payload(secret: &str, ts: i64, body: &[u8]) -> String {
    hex::encode(mac_for(secret, ts, body).finalize().into_bytes())
}

pub fn verify_request(
    secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
) -> Result<(), AuthError> {
    verify_at(secret, timestamp, signature, body, Utc::now().timestamp())
}

fn verify_at(
    secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now: i64,
) -> Result<(), AuthError> {
    let ts: i64 = timestamp
        .ok_or(AuthError::Missing(TIMESTAMP_HEADER))?
        .trim()
        .parse()
        .map_err(|_| AuthError::Malformed(TIMESTAMP_HEADER))?;
    let sig = hex::decode(signature.ok_or(AuthError::Missing(SIGNATURE_HEADER))?.trim())
        .map_err(|_| AuthError::Malformed(SIGNATURE_HEADER))?;

    if now.abs_diff(ts) > MAX_SKEW_SECS {
        return Err(AuthError::Stale);
    }

    mac_for(secret, ts, body).verify_slice(&sig).map_err(|_| AuthError::Mismatch)
}
