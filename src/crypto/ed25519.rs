//! Ed25519 over expanded secret keys
//!
//! Tor hands out v3 onion keys in *expanded* form: 64 bytes holding the
//! clamped secret scalar `a` followed by the 32-byte nonce prefix, rather
//! than the 32-byte seed most libraries start from. ed25519-dalek signs
//! from that form directly through its `hazmat` module.
//!
//! Verification is strict: small-order public keys and `R` values are
//! refused, and `S` must be reduced.

use curve25519_dalek::edwards::EdwardsPoint;
use ed25519_dalek::hazmat::{raw_sign, ExpandedSecretKey};
use ed25519_dalek::{Signature, VerifyingKey};
use sha2::{Digest, Sha512};
use zeroize::Zeroizing;

use crate::error::{AuthError, Result};

/// Expanded secret key: scalar (32) || nonce prefix (32)
pub const EXPANDED_SECRET_KEY_LEN: usize = 64;

/// Compressed Edwards point
pub const PUBLIC_KEY_LEN: usize = 32;

/// R (32) || S (32)
pub const SIGNATURE_LEN: usize = 64;

/// Expand a standard 32-byte Ed25519 seed into the 64-byte form Tor uses
pub fn expand_seed(seed: &[u8; 32]) -> Zeroizing<[u8; EXPANDED_SECRET_KEY_LEN]> {
    let mut expanded = Zeroizing::new([0u8; EXPANDED_SECRET_KEY_LEN]);
    expanded.copy_from_slice(&Sha512::digest(seed));

    expanded[0] &= 248;
    expanded[31] &= 127;
    expanded[31] |= 64;

    expanded
}

/// Derive the public key `A = a·B` of an expanded secret key
pub fn public_from_expanded(expanded: &[u8; EXPANDED_SECRET_KEY_LEN]) -> [u8; PUBLIC_KEY_LEN] {
    let esk = ExpandedSecretKey::from_bytes(expanded);
    EdwardsPoint::mul_base(&esk.scalar).compress().to_bytes()
}

/// Sign `message` with an expanded secret key
///
/// `public` must be the key's own public key; it is bound into the
/// challenge hash.
pub fn sign(
    message: &[u8],
    expanded: &[u8; EXPANDED_SECRET_KEY_LEN],
    public: &[u8; PUBLIC_KEY_LEN],
) -> Result<[u8; SIGNATURE_LEN]> {
    let verifying_key = VerifyingKey::from_bytes(public)
        .map_err(|e| AuthError::Crypto(format!("Ed25519 public key unusable: {}", e)))?;
    let esk = ExpandedSecretKey::from_bytes(expanded);

    Ok(raw_sign::<Sha512>(&esk, message, &verifying_key).to_bytes())
}

/// Verify an Ed25519 signature
///
/// A signature of the wrong length is an error; a well-formed signature
/// that does not check out is `Ok(false)`.
pub fn verify(message: &[u8], signature: &[u8], public: &[u8]) -> Result<bool> {
    let signature: &[u8; SIGNATURE_LEN] =
        signature
            .try_into()
            .map_err(|_| AuthError::SignatureSizeMismatch {
                expected: SIGNATURE_LEN,
                got: signature.len(),
            })?;
    let public: &[u8; PUBLIC_KEY_LEN] = public.try_into().map_err(|_| {
        AuthError::KeyParse(format!(
            "Ed25519 public key must be {} bytes, got {}",
            PUBLIC_KEY_LEN,
            public.len()
        ))
    })?;

    // S must fit in 253 bits
    if signature[63] & 0xe0 != 0 {
        log::debug!("Ed25519 signature rejected: S has high bits set");
        return Ok(false);
    }

    let verifying_key = match VerifyingKey::from_bytes(public) {
        Ok(key) => key,
        Err(_) => {
            log::debug!("Ed25519 signature rejected: public key is not a curve point");
            return Ok(false);
        }
    };

    match verifying_key.verify_strict(message, &Signature::from_bytes(signature)) {
        Ok(()) => Ok(true),
        Err(e) => {
            log::debug!("Ed25519 signature rejected: {}", e);
            Ok(false)
        }
    }
}
