//! Signature engine
//!
//! Two independent signature schemes operating on raw buffers:
//! - RSA-1024 + SHA-256, PKCS#1 v1.5 (legacy v2 onion identities)
//! - Ed25519 over expanded secret keys (v3 onion identities)
//!
//! Plus the entropy source used for handshake cookies and password salts.
//! Nothing in here knows about identity keys or channels.

pub mod ed25519;
pub mod random;
pub mod rsa_sha256;

pub use random::{OsRandom, RandomSource};

/// Length of a SHA-256 digest, the only input the legacy signer accepts
pub const SHA256_DIGEST_LEN: usize = 32;
