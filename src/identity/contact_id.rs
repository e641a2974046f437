//! Contact IDs
//!
//! A contact ID is `<scheme>:<service id>`, scheme `ricochet` (or the older
//! `torsion`), service ID 16 or 56 characters of lowercase base32. The
//! matching hostname is `<service id>.onion`.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::service_id::{
    self, LEGACY_SERVICE_ID_LEN, MODERN_SERVICE_ID_LEN, ONION_SUFFIX,
};
use crate::error::{AuthError, Result};

/// Scheme written by [`ContactId::from_hostname`]
pub const DEFAULT_SCHEME: &str = "ricochet";

/// Every scheme accepted when parsing
pub const SCHEMES: [&str; 2] = ["ricochet", "torsion"];

/// Lookup of existing contacts by hostname
///
/// Passed explicitly to whatever needs it (validator, inbound auth
/// channel); there is no process-wide registry.
pub trait ContactRegistry: Send + Sync {
    /// Whether `hostname` (`<service id>.onion`) belongs to a known contact
    fn is_known_contact(&self, hostname: &str) -> bool;
}

impl ContactRegistry for HashSet<String> {
    fn is_known_contact(&self, hostname: &str) -> bool {
        self.contains(&hostname.to_ascii_lowercase())
    }
}

fn is_service_id_symbol(c: u8) -> bool {
    matches!(c, b'a'..=b'z' | b'2'..=b'7')
}

fn is_valid_service_id(id: &str) -> bool {
    matches!(id.len(), LEGACY_SERVICE_ID_LEN | MODERN_SERVICE_ID_LEN)
        && id.bytes().all(is_service_id_symbol)
}

/// A parsed contact ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactId {
    scheme: String,
    service_id: String,
}

impl ContactId {
    /// Parse `<scheme>:<service id>` exactly (no trimming, lowercase only)
    pub fn parse(text: &str) -> Result<Self> {
        let (scheme, service_id) = text
            .split_once(':')
            .ok_or_else(|| AuthError::KeyParse(format!("contact ID {:?} has no scheme", text)))?;

        if !SCHEMES.contains(&scheme) {
            return Err(AuthError::KeyParse(format!(
                "unknown contact ID scheme {:?}",
                scheme
            )));
        }
        if !is_valid_service_id(service_id) {
            return Err(AuthError::KeyParse(format!(
                "{:?} is not a 16 or 56 character service ID",
                service_id
            )));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            service_id: service_id.to_string(),
        })
    }

    /// Contact ID for a bare service ID or `.onion` hostname
    pub fn from_hostname(hostname: &str) -> Result<Self> {
        let id = match hostname.len() {
            LEGACY_SERVICE_ID_LEN => hostname,
            n if (n == LEGACY_SERVICE_ID_LEN + ONION_SUFFIX.len()
                || n == MODERN_SERVICE_ID_LEN + ONION_SUFFIX.len())
                && hostname.to_ascii_lowercase().ends_with(ONION_SUFFIX) =>
            {
                &hostname[..n - ONION_SUFFIX.len()]
            }
            _ => {
                return Err(AuthError::KeyParse(format!(
                    "{:?} is not an onion hostname",
                    hostname
                )))
            }
        };

        Self::parse(&format!("{}:{}", DEFAULT_SCHEME, id))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// `<service id>.onion`
    pub fn hostname(&self) -> String {
        service_id::hostname(&self.service_id)
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.service_id)
    }
}

impl FromStr for ContactId {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

pub fn is_valid_id(text: &str) -> bool {
    ContactId::parse(text).is_ok()
}

/// Hostname for a contact ID, `None` if the ID is invalid
pub fn hostname_from_id(text: &str) -> Option<String> {
    ContactId::parse(text).ok().map(|id| id.hostname())
}

/// Contact ID string for a hostname, `None` if it is not an onion hostname
pub fn id_from_hostname(hostname: &str) -> Option<String> {
    ContactId::from_hostname(hostname).ok().map(|id| id.to_string())
}

/// Outcome of validating (possibly partial) user input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Could still become valid with more input
    Intermediate,
    Acceptable,
    Invalid,
}

/// Validates contact IDs typed by the user
///
/// Input is normalized with [`fixup`](Self::fixup) first. A well-formed ID
/// is still refused if it names an existing contact or our own identity.
pub struct ContactIdValidator<'a> {
    registry: Option<&'a dyn ContactRegistry>,
    own_hostname: Option<String>,
}

impl<'a> ContactIdValidator<'a> {
    pub fn new() -> Self {
        Self {
            registry: None,
            own_hostname: None,
        }
    }

    /// Refuse IDs of contacts in `registry`
    pub fn with_registry(mut self, registry: &'a dyn ContactRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Refuse our own ID
    pub fn with_own_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.own_hostname = Some(hostname.into().to_ascii_lowercase());
        self
    }

    /// Trim whitespace and lowercase
    pub fn fixup(text: &str) -> String {
        text.trim().to_lowercase()
    }

    pub fn validate(&self, text: &str) -> Validation {
        let text = Self::fixup(text);
        if text.is_empty() {
            return Validation::Intermediate;
        }

        let id = match ContactId::parse(&text) {
            Ok(id) => id,
            Err(_) if could_become_valid(&text) => return Validation::Intermediate,
            Err(_) => return Validation::Invalid,
        };

        let hostname = id.hostname();
        if self.matches_contact(&hostname) || self.matches_identity(&hostname) {
            log::debug!("Contact ID {} refused: already known", id);
            return Validation::Invalid;
        }

        Validation::Acceptable
    }

    fn matches_contact(&self, hostname: &str) -> bool {
        self.registry
            .map_or(false, |registry| registry.is_known_contact(hostname))
    }

    fn matches_identity(&self, hostname: &str) -> bool {
        self.own_hostname.as_deref() == Some(hostname)
    }
}

impl Default for ContactIdValidator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `text` is a proper prefix of some valid contact ID
fn could_become_valid(text: &str) -> bool {
    match text.split_once(':') {
        None => SCHEMES.iter().any(|scheme| scheme.starts_with(text)),
        Some((scheme, id)) => {
            SCHEMES.contains(&scheme)
                && id.len() < MODERN_SERVICE_ID_LEN
                && id.bytes().all(is_service_id_symbol)
        }
    }
}
