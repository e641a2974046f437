//! Text encodings used by identity keys
//!
//! - base32 (RFC 4648 alphabet, lowercase) for service IDs and v3 public keys
//! - base64 (standard alphabet) for v3 private key blobs and control-port
//!   key material

pub mod base32;
pub mod base64;
