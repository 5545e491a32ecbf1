// Wire-format encoding helpers shared by the pipeline and the wallet seam.
//
// The job service speaks base64; wallet capabilities expect hex. Conversions
// between the two live here so neither side leaks its format into the other.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("invalid base64 payload: {0}")]
    Base64(String),
}

/// Encode raw bytes as standard base64 for the job-service wire format.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a base64 transaction payload and re-encode it as uppercase hex,
/// the form wallet capabilities accept for signing.
pub fn base64_to_hex(b64: &str) -> Result<String, EncodingError> {
    let raw = STANDARD
        .decode(b64)
        .map_err(|e| EncodingError::Base64(e.to_string()))?;
    Ok(hex::encode_upper(raw))
}

/// Hex-encode a UTF-8 string.
pub fn utf8_to_hex(s: &str) -> String {
    hex::encode(s.as_bytes())
}
