//! Standard base64 (with padding)

use base64::{engine::general_purpose, Engine as _};

use crate::error::{AuthError, Result};

pub fn encode(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(data)
}

pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| AuthError::Encoding(format!("invalid base64: {}", e)))
}
