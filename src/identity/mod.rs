//! Onion-service identities
//!
//! - [`IdentityKey`]: legacy (RSA-1024) and modern (Ed25519) keys behind one
//!   tagged type
//! - [`service_id`]: v2/v3 service ID derivation and parsing
//! - [`contact_id`]: `ricochet:<service id>` strings and their validator

pub mod contact_id;
mod key;
pub mod service_id;

pub use contact_id::{ContactId, ContactIdValidator, ContactRegistry, Validation};
pub use key::{
    IdentityKey, KeyFormat, KeyType, KeyVersion, ModernPrivateKey, ModernServiceId,
    MODERN_PRIVATE_KEY_ENCODED_LEN,
};
