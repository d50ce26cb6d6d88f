//! Continuation token codec.
//!
//! State and data records travel through untrusted third parties as opaque
//! tokens: JSON, then standard base64. The output is safe to embed as a
//! single query-parameter value once the caller percent-encodes it.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// The token was not valid base64-wrapped JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("malformed continuation token")]
pub struct MalformedToken;

/// Encodes any JSON-representable value into an opaque token.
pub fn encode_token<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_vec(value).expect("JSON-representable value");
    STANDARD.encode(json)
}

/// Decodes a token produced by [`encode_token`].
///
/// Two-sided inverse: `decode_token(&encode_token(r))` yields a value
/// structurally identical to `r`.
pub fn decode_token<T: DeserializeOwned>(token: &str) -> Result<T, MalformedToken> {
    let bytes = STANDARD.decode(token).map_err(|_| MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| MalformedToken)
}
