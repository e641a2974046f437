//! Hashed control-port passwords (`HashedControlPassword` in torrc)
//!
//! Tor's iterated-and-salted S2K with SHA-1: the string `salt || password`
//! is repeated until 65536 bytes have been hashed.

use sha1::{Digest, Sha1};

use crate::crypto::random::{random_array, RandomSource};
use crate::error::Result;

pub const SALT_LEN: usize = 8;

/// Encoded count byte; expands to [`S2K_BYTE_COUNT`]
pub const S2K_COUNT_SPECIFIER: u8 = 0x60;

pub const S2K_BYTE_COUNT: usize = (16 + (S2K_COUNT_SPECIFIER as usize & 15))
    << ((S2K_COUNT_SPECIFIER as usize >> 4) + 6);

/// `"16:" + SALT + "60" + SHA1`, uppercase hex, with a fresh random salt
pub fn hashed_control_password(password: &[u8], rng: &mut dyn RandomSource) -> Result<String> {
    let salt: [u8; SALT_LEN] = random_array(rng)?;
    Ok(hash_with_salt(password, &salt))
}

/// Same as [`hashed_control_password`] with a caller-chosen salt
pub fn hash_with_salt(password: &[u8], salt: &[u8; SALT_LEN]) -> String {
    let mut input = Vec::with_capacity(SALT_LEN + password.len());
    input.extend_from_slice(salt);
    input.extend_from_slice(password);

    let mut hasher = Sha1::new();
    let mut remaining = S2K_BYTE_COUNT;
    while remaining > 0 {
        let n = remaining.min(input.len());
        hasher.update(&input[..n]);
        remaining -= n;
    }
    let digest = hasher.finalize();

    format!(
        "16:{}{:02X}{}",
        hex::encode_upper(salt),
        S2K_COUNT_SPECIFIER,
        hex::encode_upper(digest)
    )
}
