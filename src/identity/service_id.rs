//! Service ID derivation
//!
//! v2 (legacy): `base32(SHA1(DER public key)[..10])`, 16 symbols.
//!
//! v3 (modern): `base32(PUBKEY || CHECKSUM || VERSION)`, 56 symbols, where
//! `CHECKSUM = SHA3-256(".onion checksum" || PUBKEY || VERSION)[..2]` and
//! `VERSION = 0x03`.
//!
//! The first 52 symbols of a v3 ID carry the whole public key (260 bits,
//! the last 4 of which belong to the checksum). That prefix is what a
//! modern identity puts on the wire as its encoded public key.

use sha1::Sha1;
use sha2::Digest;
use sha3::Sha3_256;

use crate::codec::base32;
use crate::error::{AuthError, Result};

/// Hostname suffix for onion services
pub const ONION_SUFFIX: &str = ".onion";

pub const LEGACY_SERVICE_ID_LEN: usize = 16;
pub const MODERN_SERVICE_ID_LEN: usize = 56;

/// Length of the base32 public key prefix of a v3 service ID
pub const MODERN_ENCODED_PUBLIC_KEY_LEN: usize = 52;

/// Length of the SHA-1 digest truncated into a v2 service ID
const LEGACY_DIGEST_PREFIX_LEN: usize = 10;

const MODERN_VERSION: u8 = 0x03;
const CHECKSUM_CONSTANT: &[u8] = b".onion checksum";

/// SHA-1 of a PKCS#1 DER public key
pub fn legacy_public_key_digest(der: &[u8]) -> [u8; 20] {
    Sha1::digest(der).into()
}

/// v2 service ID of a PKCS#1 DER public key
pub fn legacy_from_public_der(der: &[u8]) -> Result<String> {
    let digest = legacy_public_key_digest(der);
    base32::encode(&digest[..LEGACY_DIGEST_PREFIX_LEN])
}

fn modern_checksum(public: &[u8; 32]) -> [u8; 2] {
    let mut hasher = Sha3_256::new();
    hasher.update(CHECKSUM_CONSTANT);
    hasher.update(public);
    hasher.update([MODERN_VERSION]);
    let digest = hasher.finalize();
    [digest[0], digest[1]]
}

/// v3 service ID of an Ed25519 public key
pub fn modern_from_public_key(public: &[u8; 32]) -> Result<String> {
    let mut raw = [0u8; 35];
    raw[..32].copy_from_slice(public);
    raw[32..34].copy_from_slice(&modern_checksum(public));
    raw[34] = MODERN_VERSION;
    base32::encode(&raw)
}

/// Parse a v3 service ID and return its public key
///
/// Length, alphabet, version byte and checksum are all checked.
pub fn parse_modern(service_id: &str) -> Result<[u8; 32]> {
    if service_id.len() != MODERN_SERVICE_ID_LEN {
        return Err(AuthError::KeyParse(format!(
            "v3 service ID must be {} characters, got {}",
            MODERN_SERVICE_ID_LEN,
            service_id.len()
        )));
    }

    let raw = base32::decode(service_id)
        .map_err(|e| AuthError::KeyParse(format!("v3 service ID: {}", e)))?;

    if raw[34] != MODERN_VERSION {
        return Err(AuthError::KeyParse(format!(
            "v3 service ID has version byte {}, expected {}",
            raw[34], MODERN_VERSION
        )));
    }

    let mut public = [0u8; 32];
    public.copy_from_slice(&raw[..32]);

    if raw[32..34] != modern_checksum(&public) {
        return Err(AuthError::KeyParse("v3 service ID checksum mismatch".into()));
    }

    Ok(public)
}

/// Decode the 52-symbol encoded public key of a modern identity
pub fn decode_modern_public_key(encoded: &str) -> Result<[u8; 32]> {
    if encoded.len() != MODERN_ENCODED_PUBLIC_KEY_LEN {
        return Err(AuthError::KeyParse(format!(
            "encoded v3 public key must be {} characters, got {}",
            MODERN_ENCODED_PUBLIC_KEY_LEN,
            encoded.len()
        )));
    }

    // 52 symbols = 260 bits, the trailing 4 are dropped
    let bytes = base32::decode_padded(encoded)
        .map_err(|e| AuthError::KeyParse(format!("encoded v3 public key: {}", e)))?;

    bytes
        .as_slice()
        .try_into()
        .map_err(|_| AuthError::KeyParse("encoded v3 public key is not 32 bytes".into()))
}

/// `<service_id>.onion`
pub fn hostname(service_id: &str) -> String {
    format!("{}{}", service_id, ONION_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{MODERN_PUBLIC_HEX, MODERN_SERVICE_ID};

    fn modern_public() -> [u8; 32] {
        hex::decode(MODERN_PUBLIC_HEX).unwrap().try_into().unwrap()
    }

    #[test]
    fn test_modern_service_id_vector() {
        let id = modern_from_public_key(&modern_public()).unwrap();
        assert_eq!(id, MODERN_SERVICE_ID);
        assert_eq!(id.len(), MODERN_SERVICE_ID_LEN);
    }

    #[test]
    fn test_parse_modern_roundtrip() {
        assert_eq!(parse_modern(MODERN_SERVICE_ID).unwrap(), modern_public());
        assert_eq!(
            parse_modern(&MODERN_SERVICE_ID.to_uppercase()).unwrap(),
            modern_public()
        );
    }

    #[test]
    fn test_parse_modern_rejects_bad_checksum() {
        // Flip a symbol inside the checksum region
        let mut id = MODERN_SERVICE_ID.as_bytes().to_vec();
        id[53] = if id[53] == b'a' { b'b' } else { b'a' };
        let err = parse_modern(std::str::from_utf8(&id).unwrap()).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_parse_modern_rejects_wrong_length_and_alphabet() {
        assert!(parse_modern(&MODERN_SERVICE_ID[..55]).is_err());
        assert!(parse_modern(&format!("{}0", &MODERN_SERVICE_ID[..55])).is_err());
    }

    #[test]
    fn test_encoded_public_key_prefix_decodes() {
        let prefix = &MODERN_SERVICE_ID[..MODERN_ENCODED_PUBLIC_KEY_LEN];
        assert_eq!(decode_modern_public_key(prefix).unwrap(), modern_public());
        assert!(decode_modern_public_key(MODERN_SERVICE_ID).is_err());
    }

    #[test]
    fn test_hostname() {
        assert_eq!(hostname("mi5b77eu3d4o3tk6"), "mi5b77eu3d4o3tk6.onion");
    }
}
