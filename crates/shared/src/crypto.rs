//! Cryptographic utilities for idempotency keys, capability tokens and
//! webhook signatures.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes in a check-in token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Errors raised while verifying a signed webhook payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature header is malformed")]
    MalformedHeader,

    #[error("Signature timestamp is outside the tolerance window")]
    TimestampOutOfTolerance,

    #[error("Signature does not match payload")]
    Mismatch,

    #[error("Invalid signing secret")]
    InvalidSecret,
}

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates an unguessable, URL-safe token from the OS random source.
///
/// The token carries no information about the record it identifies.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Computes the hex-encoded HMAC-SHA256 of `payload` keyed by `secret`.
pub fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Builds a `t=<unix>,v1=<hex>` signature header over `"{t}.{body}"`.
pub fn sign_webhook(secret: &str, timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
    let signature = hmac_sha256_hex(secret, &signed_message(timestamp, body))?;
    Ok(format!("t={},v1={}", timestamp, signature))
}

/// Verifies a `t=<unix>,v1=<hex>` signature header.
///
/// Multiple `v1` entries are accepted (secret rotation); any match passes.
/// The comparison is constant-time.
pub fn verify_webhook_signature(
    secret: &str,
    header: &str,
    body: &[u8],
    now_unix: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let (key, value) = part
            .trim()
            .split_once('=')
            .ok_or(SignatureError::MalformedHeader)?;
        match key {
            "t" => {
                timestamp = Some(value.parse().map_err(|_| SignatureError::MalformedHeader)?);
            }
            "v1" => {
                signatures.push(hex::decode(value).map_err(|_| SignatureError::MalformedHeader)?);
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }
    if (now_unix - timestamp).abs() > tolerance_secs {
        return Err(SignatureError::TimestampOutOfTolerance);
    }

    let message = signed_message(timestamp, body);
    for signature in signatures {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| SignatureError::InvalidSecret)?;
        mac.update(&message);
        if mac.verify_slice(&signature).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

fn signed_message(timestamp: i64, body: &[u8]) -> Vec<u8> {
    let mut message = format!("{}.", timestamp).into_bytes();
    message.extend_from_slice(body);
    message
}
