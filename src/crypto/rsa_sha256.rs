//! RSA + SHA-256, PKCS#1 v1.5 signatures (legacy v2 identities)
//!
//! The caller hands in a 32-byte digest; this module never hashes. The
//! signature is always exactly the modulus size, 128 bytes for the
//! 1024-bit keys v2 onion services use.

use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use super::SHA256_DIGEST_LEN;
use crate::error::{AuthError, Result};

/// Modulus size every legacy onion identity key has
pub const LEGACY_KEY_BITS: usize = 1024;

/// Signature length produced by a 1024-bit key
pub const LEGACY_SIGNATURE_LEN: usize = LEGACY_KEY_BITS / 8;

fn check_digest(digest: &[u8]) -> Result<()> {
    if digest.len() != SHA256_DIGEST_LEN {
        return Err(AuthError::Crypto(format!(
            "RSA-SHA256 expects a {}-byte digest, got {}",
            SHA256_DIGEST_LEN,
            digest.len()
        )));
    }
    Ok(())
}

/// Sign a SHA-256 digest
///
/// Uses RSA blinding with the OS RNG; PKCS#1 v1.5 output is still
/// deterministic for a given key and digest.
pub fn sign(digest: &[u8], key: &RsaPrivateKey) -> Result<Vec<u8>> {
    check_digest(digest)?;

    let signature = key
        .sign_with_rng(&mut OsRng, Pkcs1v15Sign::new::<Sha256>(), digest)
        .map_err(|e| {
            log::warn!("RSA signing failed: {}", e);
            AuthError::Crypto(format!("RSA signing failed: {}", e))
        })?;

    Ok(signature)
}

/// Verify a signature as produced by [`sign`]
///
/// Returns `Err(SignatureSizeMismatch)` for a signature that cannot
/// possibly be valid for this key, and `Ok(false)` for a well-formed
/// signature that does not verify.
pub fn verify(digest: &[u8], signature: &[u8], key: &RsaPublicKey) -> Result<bool> {
    check_digest(digest)?;

    let expected = key.size();
    if signature.len() != expected {
        return Err(AuthError::SignatureSizeMismatch {
            expected,
            got: signature.len(),
        });
    }

    match key.verify(Pkcs1v15Sign::new::<Sha256>(), digest, signature) {
        Ok(()) => Ok(true),
        Err(e) => {
            log::debug!("RSA signature rejected: {}", e);
            Ok(false)
        }
    }
}

/// Number of significant bits in the modulus
pub fn modulus_bits(key: &impl PublicKeyParts) -> usize {
    key.n().bits()
}
