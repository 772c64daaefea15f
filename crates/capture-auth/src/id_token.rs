//! Identity token claim extraction.
//!
//! Only the claims segment is decoded. The signature is not verified.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::Value;
use thiserror::Error;

/// Failure to decode an identity token.
#[derive(Error, Debug)]
pub enum IdTokenError {
    #[error("identity token is not a three-part token")]
    Malformed,

    #[error("claims segment is not base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("claims segment is not JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode the claims segment of a compact token.
pub fn decode_claims(id_token: &str) -> Result<Value, IdTokenError> {
    let mut segments = id_token.split('.');
    let (Some(_header), Some(claims), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(IdTokenError::Malformed);
    };

    // base64url without padding -> standard alphabet, padded
    let mut standard: String = claims
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    while standard.len() % 4 != 0 {
        standard.push('=');
    }

    let bytes = BASE64.decode(standard.as_bytes())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// The `nonce` claim, if present and non-empty.
pub fn nonce_claim(id_token: &str) -> Result<Option<String>, IdTokenError> {
    let claims = decode_claims(id_token)?;
    Ok(match claims.get("nonce") {
        None | Some(Value::Null) => None,
        Some(Value::String(nonce)) if nonce.is_empty() => None,
        Some(Value::String(nonce)) => Some(nonce.clone()),
        Some(other) => Some(other.to_string()),
    })
}
