//! Handshake configuration

use serde::{Deserialize, Serialize};

use crate::crypto::rsa_sha256::LEGACY_KEY_BITS;
use crate::error::{AuthError, Result};

/// Largest PKCS#1 DER public key accepted in a legacy proof
pub const MAX_LEGACY_PUBLIC_KEY_LEN: usize = 150;

/// Configuration for the hidden-service auth channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Accept proofs made with legacy RSA identities (default: true)
    pub accept_legacy: bool,

    /// Accept proofs made with modern Ed25519 identities (default: true)
    pub accept_modern: bool,

    /// Required RSA modulus size for legacy proofs (default: 1024)
    pub legacy_key_bits: usize,

    /// Upper bound on the DER public key in a legacy proof (default: 150)
    pub max_legacy_public_key_len: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            accept_legacy: true,
            accept_modern: true,
            legacy_key_bits: LEGACY_KEY_BITS,
            max_legacy_public_key_len: MAX_LEGACY_PUBLIC_KEY_LEN,
        }
    }
}

impl AuthConfig {
    /// Only v3 identities are accepted
    pub fn modern_only() -> Self {
        Self {
            accept_legacy: false,
            ..Default::default()
        }
    }

    /// Load from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AuthError::Config(format!("Failed to parse auth config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| AuthError::Config(format!("Failed to serialize auth config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.accept_legacy && !self.accept_modern {
            return Err(AuthError::Config(
                "at least one key generation must be accepted".into(),
            ));
        }
        if self.legacy_key_bits == 0 || self.legacy_key_bits % 8 != 0 {
            return Err(AuthError::Config(format!(
                "legacy_key_bits must be a positive multiple of 8, got {}",
                self.legacy_key_bits
            )));
        }
        Ok(())
    }
}
