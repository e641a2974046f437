//! `ADD_ONION` command: publish an onion service and collect its keys
//!
//! The control-port socket is not part of this crate. The caller writes
//! [`AddOnionCommand::build`] to the socket and feeds every reply line back
//! through [`AddOnionCommand::on_reply`], then [`AddOnionCommand::on_finished`]
//! with the final status.

use std::fmt;
use std::net::SocketAddr;

use crate::codec::base64;
use crate::error::{AuthError, Result};
use crate::identity::service_id::MODERN_SERVICE_ID_LEN;
use crate::identity::{IdentityKey, KeyFormat, KeyType, KeyVersion};

/// Control-port status for a successful command
pub const STATUS_OK: u16 = 250;

const LEGACY_KEY_PREFIX: &str = "PrivateKey=RSA1024:";
const MODERN_KEY_PREFIX: &str = "PrivateKey=ED25519-V3:";
const SERVICE_ID_PREFIX: &str = "ServiceID=";

/// One `Port=` mapping: connections to `service_port` on the onion
/// service are forwarded to `target`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnionTarget {
    pub service_port: u16,
    pub target: SocketAddr,
}

impl fmt::Display for OnionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Port={},{}", self.service_port, self.target)
    }
}

pub struct AddOnionCommand {
    key: IdentityKey,
    targets: Vec<OnionTarget>,
    status_code: Option<u16>,
    error_message: Option<String>,
    private_key: Option<IdentityKey>,
    service_id: Option<IdentityKey>,
}

impl AddOnionCommand {
    /// Publish a service for `key`, or a fresh v3 service if it is unloaded
    pub fn new(key: IdentityKey) -> Self {
        Self {
            key,
            targets: Vec::new(),
            status_code: None,
            error_message: None,
            private_key: None,
            service_id: None,
        }
    }

    pub fn add_target(&mut self, service_port: u16, target: SocketAddr) -> &mut Self {
        self.targets.push(OnionTarget {
            service_port,
            target,
        });
        self
    }

    pub fn targets(&self) -> &[OnionTarget] {
        &self.targets
    }

    /// The command line, including the trailing CRLF
    ///
    /// The returned string embeds private key material when a key was
    /// supplied.
    pub fn build(&self) -> Result<String> {
        let mut out = String::from("ADD_ONION ");

        match self.key.version() {
            None => out.push_str("NEW:ED25519-V3"),
            Some(_) if !self.key.is_private() => {
                return Err(AuthError::invariant(format!(
                    "ADD_ONION needs a private key, got {}",
                    self.key.variant_name()
                )));
            }
            Some(KeyVersion::Legacy) => {
                let der = self.key.encoded_private_key(KeyFormat::Der)?;
                out.push_str("RSA1024:");
                out.push_str(&base64::encode(&der));
            }
            Some(KeyVersion::Modern) => {
                let blob = self.key.encoded_private_key(KeyFormat::Encoded)?;
                let blob = std::str::from_utf8(&blob)
                    .map_err(|_| AuthError::invariant("v3 key blob is not ASCII"))?;
                out.push_str("ED25519-V3:");
                out.push_str(blob);
            }
        }

        for target in &self.targets {
            out.push(' ');
            out.push_str(&target.to_string());
        }

        out.push_str("\r\n");
        Ok(out)
    }

    /// Feed one reply line (without the `250-` framing)
    pub fn on_reply(&mut self, status_code: u16, line: &str) {
        self.status_code = Some(status_code);

        if status_code != STATUS_OK {
            log::warn!("⚠️ ADD_ONION failed with {}: {}", status_code, line);
            self.error_message = Some(line.to_string());
            return;
        }

        if let Some(blob) = line.strip_prefix(LEGACY_KEY_PREFIX) {
            let key = base64::decode(blob).and_then(|der| {
                IdentityKey::from_data(&der, KeyType::Private, KeyFormat::Der)
            });
            self.store_private_key(key);
        } else if let Some(blob) = line.strip_prefix(MODERN_KEY_PREFIX) {
            let key = IdentityKey::from_data(blob.as_bytes(), KeyType::Private, KeyFormat::Encoded);
            self.store_private_key(key);
        } else if let Some(id) = line.strip_prefix(SERVICE_ID_PREFIX) {
            // v2 services are identified by their private key alone
            if id.len() != MODERN_SERVICE_ID_LEN {
                return;
            }
            match IdentityKey::from_data(id.as_bytes(), KeyType::Public, KeyFormat::Encoded) {
                Ok(key) => self.service_id = Some(key),
                Err(e) => {
                    log::warn!("⚠️ ADD_ONION returned an invalid service ID: {}", e);
                    self.error_message = Some("Service ID decoding failed".into());
                }
            }
        }
    }

    fn store_private_key(&mut self, key: Result<IdentityKey>) {
        match key {
            Ok(key) => self.private_key = Some(key),
            Err(e) => {
                log::warn!("⚠️ ADD_ONION returned an unusable key: {}", e);
                self.error_message = Some("Key decoding failed".into());
            }
        }
    }

    pub fn on_finished(&mut self, status_code: u16) {
        self.status_code = Some(status_code);
        if self.is_successful() {
            log::info!("✅ Onion service published");
        }
    }

    /// Status 250 and no reply line was rejected
    pub fn is_successful(&self) -> bool {
        self.status_code == Some(STATUS_OK) && self.error_message.is_none()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// The private key generated by Tor (only for `NEW:` requests)
    pub fn private_key(&self) -> Option<&IdentityKey> {
        self.private_key.as_ref()
    }

    /// The published v3 service identity
    pub fn service_id(&self) -> Option<&IdentityKey> {
        self.service_id.as_ref()
    }

    /// The key the service now runs under
    ///
    /// This is the generated key if Tor returned one, otherwise the key
    /// the command was built with.
    pub fn into_private_key(self) -> Result<IdentityKey> {
        if !self.is_successful() {
            return Err(AuthError::Control(
                self.error_message
                    .clone()
                    .unwrap_or_else(|| "ADD_ONION did not succeed".into()),
            ));
        }
        match self.private_key {
            Some(key) => Ok(key),
            None if self.key.is_loaded() => Ok(self.key),
            None => Err(AuthError::Control("ADD_ONION reply carried no private key".into())),
        }
    }
}

impl fmt::Debug for AddOnionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddOnionCommand")
            .field("key", &self.key)
            .field("targets", &self.targets)
            .field("status_code", &self.status_code)
            .field("error_message", &self.error_message)
            .finish()
    }
}
