//! Hidden-service authentication channel
//!
//! Proves to the server end of a connection that the client controls the
//! private key of an onion identity.
//!
//! ```text
//!   Prover (outbound)                         Verifier (inbound)
//!   ─────────────────                         ──────────────────
//!   OpenChannel { client_cookie }     ───►
//!                                     ◄───    ChannelResult { server_cookie }
//!   Proof { public_key, signature }   ───►
//!                                     ◄───    Result { accepted, is_known_contact }
//!   close                                     close
//! ```
//!
//! The signature covers
//! `HMAC-SHA256(key = client_cookie || server_cookie, msg = ProofData)`
//! where `ProofData` is the first 16 characters of the client's service ID
//! followed by the first 16 characters of the server's hostname.
//!
//! Closing delivers exactly one [`AuthOutcome`] to the outcome handler:
//! `Accepted` if the handshake succeeded, `Rejected` in every other case.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::connection::{AuthPurpose, Connection, ConnectionDirection};
use super::messages::{
    AuthResult, ChannelOpenResult, Cookie, OpenChannelRequest, Packet, Proof, CHANNEL_TYPE,
    COOKIE_LEN,
};
use crate::config::AuthConfig;
use crate::crypto::ed25519::SIGNATURE_LEN as MODERN_SIGNATURE_LEN;
use crate::crypto::random::{OsRandom, RandomSource};
use crate::crypto::rsa_sha256::LEGACY_SIGNATURE_LEN;
use crate::error::{AuthError, ChannelError, Result};
use crate::identity::service_id::{self, LEGACY_SERVICE_ID_LEN};
use crate::identity::{ContactRegistry, IdentityKey, KeyFormat, KeyType, KeyVersion};

type HmacSha256 = Hmac<Sha256>;

/// Characters of each hostname that go into the proof
pub const PROOF_HOSTNAME_LEN: usize = LEGACY_SERVICE_ID_LEN;

/// Length of [`proof_data`] output
pub const PROOF_DATA_LEN: usize = 2 * PROOF_HOSTNAME_LEN;

/// Which side of the handshake a channel plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelDirection {
    /// Opens the channel and proves its identity
    Outbound,
    /// Accepts the channel and checks the proof
    Inbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Unopened,
    /// Outbound: open request sent, waiting for the server cookie
    AwaitingCookieExchange,
    /// Outbound: proof sent, waiting for the result
    ProofSent,
    /// Inbound: cookies exchanged, waiting for the proof
    ProofPending,
    /// Inbound: verdict sent
    ResultSent,
    /// Outbound: verdict received
    ResultReceived,
    Accepted,
    Rejected,
}

impl ChannelState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelState::Accepted | ChannelState::Rejected)
    }
}

/// Final result of one handshake attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted,
    Rejected,
}

type OutcomeHandler = Box<dyn FnOnce(AuthOutcome) + Send>;

enum Role {
    Prover { key: IdentityKey },
    Verifier { registry: Arc<dyn ContactRegistry> },
}

/// `client_service_id[..16] || server_hostname[..16]`
pub fn proof_data(client_service_id: &str, server_hostname: &str) -> Result<[u8; PROOF_DATA_LEN]> {
    let client = client_service_id.as_bytes();
    let server = server_hostname.as_bytes();

    if client.len() < PROOF_HOSTNAME_LEN || server.len() < PROOF_HOSTNAME_LEN {
        return Err(AuthError::invariant(format!(
            "cannot build proof data from hostnames {:?} and {:?}",
            client_service_id, server_hostname
        )));
    }

    let mut data = [0u8; PROOF_DATA_LEN];
    data[..PROOF_HOSTNAME_LEN].copy_from_slice(&client[..PROOF_HOSTNAME_LEN]);
    data[PROOF_HOSTNAME_LEN..].copy_from_slice(&server[..PROOF_HOSTNAME_LEN]);
    Ok(data)
}

/// HMAC-SHA256 of the proof data, keyed with both cookies
pub fn proof_hmac(client_cookie: &Cookie, server_cookie: &Cookie, proof_data: &[u8]) -> Result<[u8; 32]> {
    let mut key = [0u8; 2 * COOKIE_LEN];
    key[..COOKIE_LEN].copy_from_slice(client_cookie.as_bytes());
    key[COOKIE_LEN..].copy_from_slice(server_cookie.as_bytes());

    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| AuthError::Crypto(format!("HMAC init failed: {}", e)))?;
    mac.update(proof_data);
    Ok(mac.finalize().into_bytes().into())
}

/// One `im.ricochet.auth.hidden-service` channel
pub struct AuthChannel {
    connection: Arc<dyn Connection>,
    role: Role,
    config: AuthConfig,
    rng: Box<dyn RandomSource>,
    state: ChannelState,
    client_cookie: Option<Cookie>,
    server_cookie: Option<Cookie>,
    accepted: bool,
    registered: bool,
    on_outcome: Option<OutcomeHandler>,
}

impl AuthChannel {
    fn new(connection: Arc<dyn Connection>, role: Role) -> Self {
        Self {
            connection,
            role,
            config: AuthConfig::default(),
            rng: Box::new(OsRandom),
            state: ChannelState::Unopened,
            client_cookie: None,
            server_cookie: None,
            accepted: false,
            registered: false,
            on_outcome: None,
        }
    }

    /// Channel that will prove ownership of `key` to the server
    ///
    /// `key` must be a loaded private key.
    pub fn outbound(connection: Arc<dyn Connection>, key: IdentityKey) -> Result<Self> {
        if !key.is_loaded() || !key.is_private() {
            return Err(AuthError::invariant(format!(
                "auth channel cannot authenticate with a {} key",
                key.variant_name()
            )));
        }
        Ok(Self::new(connection, Role::Prover { key }))
    }

    /// Channel that will verify a client's proof
    ///
    /// `registry` decides whether an authenticated peer is reported back as
    /// a known contact.
    pub fn inbound(connection: Arc<dyn Connection>, registry: Arc<dyn ContactRegistry>) -> Self {
        Self::new(connection, Role::Verifier { registry })
    }

    pub fn with_config(mut self, config: AuthConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the cookie RNG (defaults to the OS CSPRNG)
    pub fn with_rng(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    /// Called exactly once, when the channel closes
    pub fn on_outcome(mut self, handler: impl FnOnce(AuthOutcome) + Send + 'static) -> Self {
        self.on_outcome = Some(Box::new(handler));
        self
    }

    pub fn direction(&self) -> ChannelDirection {
        match self.role {
            Role::Prover { .. } => ChannelDirection::Outbound,
            Role::Verifier { .. } => ChannelDirection::Inbound,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_accepted(&self) -> bool {
        self.state == ChannelState::Accepted
    }

    /// `Some` once the channel has closed
    pub fn outcome(&self) -> Option<AuthOutcome> {
        match self.state {
            ChannelState::Accepted => Some(AuthOutcome::Accepted),
            ChannelState::Rejected => Some(AuthOutcome::Rejected),
            _ => None,
        }
    }

    fn expect_state(&self, direction: ChannelDirection, state: ChannelState, action: &str) -> Result<()> {
        if self.direction() != direction || self.state != state {
            return Err(AuthError::invariant(format!(
                "cannot {} on a {:?} auth channel in state {:?}",
                action,
                self.direction(),
                self.state
            )));
        }
        Ok(())
    }

    // ===== Outbound =====

    /// Start the handshake: claim the channel slot and pick a client cookie
    pub fn open_request(&mut self, channel_identifier: i32) -> Result<OpenChannelRequest> {
        self.expect_state(ChannelDirection::Outbound, ChannelState::Unopened, "open")?;

        if !self.connection.try_register_channel(CHANNEL_TYPE) {
            log::debug!("Connection already has an {} channel", CHANNEL_TYPE);
            self.close();
            return Err(AuthError::bad_usage());
        }
        self.registered = true;

        let cookie = match Cookie::generate(self.rng.as_mut()) {
            Ok(cookie) => cookie,
            Err(e) => {
                log::error!("❌ Failed to generate client cookie: {}", e);
                self.close();
                return Err(e);
            }
        };
        self.client_cookie = Some(cookie);
        self.state = ChannelState::AwaitingCookieExchange;

        Ok(OpenChannelRequest {
            channel_identifier,
            channel_type: CHANNEL_TYPE.to_string(),
            client_cookie: Some(cookie.as_bytes().to_vec()),
        })
    }

    /// Handle the server's answer to our open request, then send the proof
    pub fn process_open_result(&mut self, result: &ChannelOpenResult) -> Result<()> {
        self.expect_state(
            ChannelDirection::Outbound,
            ChannelState::AwaitingCookieExchange,
            "process an open result",
        )?;

        if !result.opened {
            let error = result.common_error.unwrap_or(ChannelError::GenericError);
            log::warn!("⚠️ Server refused {} channel: {:?}", CHANNEL_TYPE, error);
            self.close();
            return Err(AuthError::ChannelRejected(error));
        }

        let server_cookie = result.server_cookie.as_deref().and_then(Cookie::from_slice);
        let Some(server_cookie) = server_cookie else {
            log::warn!("Received ChannelResult for {} with no valid server_cookie", CHANNEL_TYPE);
            self.close();
            return Err(AuthError::ProtocolViolation(
                "channel result carries no valid server cookie".into(),
            ));
        };
        self.server_cookie = Some(server_cookie);

        if let Err(e) = self.send_proof() {
            log::error!("❌ Creating proof on {} failed: {}", CHANNEL_TYPE, e);
            self.close();
            return Err(e);
        }

        self.state = ChannelState::ProofSent;
        Ok(())
    }

    fn send_proof(&self) -> Result<()> {
        let (Some(client_cookie), Some(server_cookie)) = (self.client_cookie, self.server_cookie)
        else {
            return Err(AuthError::invariant("cannot create a proof without both cookies"));
        };
        let Role::Prover { key } = &self.role else {
            return Err(AuthError::invariant("proofs are only sent from outbound channels"));
        };

        let public_key = match key.version() {
            Some(KeyVersion::Legacy) => {
                let der = key.encoded_public_key(KeyFormat::Der)?;
                if der.len() > self.config.max_legacy_public_key_len {
                    return Err(AuthError::invariant(format!(
                        "unexpected size {} for encoded public key",
                        der.len()
                    )));
                }
                der
            }
            _ => key.encoded_public_key(KeyFormat::Encoded)?,
        };

        let data = proof_data(&key.service_id()?, &self.connection.server_hostname())?;
        let hmac = proof_hmac(&client_cookie, &server_cookie, &data)?;
        let signature = key.sign(&hmac)?;

        let packet = Packet::Proof(Proof {
            public_key,
            signature,
        });
        self.connection.send_packet(CHANNEL_TYPE, packet.encode())?;

        log::debug!("{} sent outbound authentication packet", CHANNEL_TYPE);
        Ok(())
    }

    // ===== Inbound =====

    /// Decide whether to accept a peer's open request
    ///
    /// On success the returned result carries our server cookie. On
    /// `Err(ChannelRejected(code))` the caller should answer with
    /// [`ChannelOpenResult::refused`]; the channel is closed either way.
    pub fn accept_open_request(&mut self, request: &OpenChannelRequest) -> Result<ChannelOpenResult> {
        self.expect_state(ChannelDirection::Inbound, ChannelState::Unopened, "accept an open request")?;

        if let Err(e) = self.check_open_request(request) {
            self.close();
            return Err(e);
        }

        let server_cookie = match Cookie::generate(self.rng.as_mut()) {
            Ok(cookie) => cookie,
            Err(e) => {
                log::error!("❌ Failed to generate server cookie: {}", e);
                self.close();
                return Err(e);
            }
        };
        self.server_cookie = Some(server_cookie);
        self.state = ChannelState::ProofPending;

        log::debug!("Accepted inbound {}", CHANNEL_TYPE);
        Ok(ChannelOpenResult::opened(request.channel_identifier, &server_cookie))
    }

    fn check_open_request(&mut self, request: &OpenChannelRequest) -> Result<()> {
        if request.channel_type != CHANNEL_TYPE {
            log::debug!("Rejecting open request for unknown type {:?}", request.channel_type);
            return Err(AuthError::ChannelRejected(ChannelError::UnknownTypeError));
        }

        if self.connection.direction() != ConnectionDirection::ServerSide {
            log::debug!("Rejecting {} from server side", CHANNEL_TYPE);
            return Err(AuthError::bad_usage());
        }

        if self.connection.has_authenticated(AuthPurpose::HiddenService) {
            log::debug!("Rejecting {} on authenticated connection", CHANNEL_TYPE);
            return Err(AuthError::bad_usage());
        }

        let client_cookie = request.client_cookie.as_deref().and_then(Cookie::from_slice);
        let Some(client_cookie) = client_cookie else {
            log::debug!("Received OpenChannel for {} with no valid client_cookie", CHANNEL_TYPE);
            return Err(AuthError::bad_usage());
        };

        if !self.connection.try_register_channel(CHANNEL_TYPE) {
            log::debug!(
                "Rejecting instance of {} on a connection that already has one",
                CHANNEL_TYPE
            );
            return Err(AuthError::bad_usage());
        }
        self.registered = true;
        self.client_cookie = Some(client_cookie);
        Ok(())
    }

    /// Check a proof. `Ok` holds the prover's hostname.
    fn verify_proof(&self, proof: &Proof, client_cookie: &Cookie, server_cookie: &Cookie) -> Result<String> {
        let signature_len = proof.signature.len();

        let key = if signature_len == LEGACY_SIGNATURE_LEN && self.config.accept_legacy {
            if proof.public_key.len() > self.config.max_legacy_public_key_len {
                return Err(AuthError::ProtocolViolation(format!(
                    "legacy public key of {} bytes",
                    proof.public_key.len()
                )));
            }
            let key = IdentityKey::from_data(&proof.public_key, KeyType::Public, KeyFormat::Der)?;
            if key.bits() != self.config.legacy_key_bits {
                return Err(AuthError::UnsupportedKeySize {
                    bits: key.bits(),
                    expected: self.config.legacy_key_bits,
                });
            }
            key
        } else if signature_len == MODERN_SIGNATURE_LEN && self.config.accept_modern {
            let encoded = std::str::from_utf8(&proof.public_key)
                .map_err(|_| AuthError::KeyParse("v3 public key is not ASCII".into()))?;
            let public = service_id::decode_modern_public_key(encoded)?;
            IdentityKey::from_modern_public_key(&public)?
        } else {
            return Err(AuthError::SignatureSizeMismatch {
                expected: if self.config.accept_legacy {
                    LEGACY_SIGNATURE_LEN
                } else {
                    MODERN_SIGNATURE_LEN
                },
                got: signature_len,
            });
        };

        let client_service_id = key.service_id()?;
        let data = proof_data(&client_service_id, &self.connection.server_hostname())?;
        let hmac = proof_hmac(client_cookie, server_cookie, &data)?;

        if !key.verify(&hmac, &proof.signature)? {
            return Err(AuthError::ProtocolViolation("signature verification failed".into()));
        }

        Ok(service_id::hostname(&client_service_id))
    }

    fn handle_proof(&mut self, proof: &Proof) -> Result<()> {
        if self.direction() != ChannelDirection::Inbound || self.state != ChannelState::ProofPending {
            log::warn!("⚠️ Received unexpected proof on {:?} {}", self.direction(), CHANNEL_TYPE);
            self.close();
            return Err(AuthError::ProtocolViolation("unexpected proof".into()));
        }

        let (Some(client_cookie), Some(server_cookie)) = (self.client_cookie, self.server_cookie)
        else {
            self.close();
            return Err(AuthError::invariant("cannot check a proof without both cookies"));
        };

        let mut result = AuthResult::rejected();
        let mut failure = None;

        match self.verify_proof(proof, &client_cookie, &server_cookie) {
            Ok(hostname) => {
                log::info!("✅ {} accepted inbound authentication for {}", CHANNEL_TYPE, hostname);
                self.connection
                    .grant_authentication(AuthPurpose::HiddenService, Some(hostname.clone()));
                self.accepted = true;
                result.accepted = true;
                if let Role::Verifier { registry } = &self.role {
                    result.is_known_contact = registry.is_known_contact(&hostname);
                }
            }
            Err(e) => {
                log::warn!("⚠️ Rejecting proof on {}: {}", CHANNEL_TYPE, e);
                if e.is_fatal() {
                    failure = Some(e);
                }
            }
        }

        let sent = self
            .connection
            .send_packet(CHANNEL_TYPE, Packet::Result(result).encode());
        self.state = ChannelState::ResultSent;

        // Always closes; this also delivers the outcome.
        self.close();

        sent?;
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn handle_result(&mut self, result: &AuthResult) -> Result<()> {
        if self.direction() != ChannelDirection::Outbound || self.state != ChannelState::ProofSent {
            log::warn!("⚠️ Received unexpected result on {:?} {}", self.direction(), CHANNEL_TYPE);
            self.close();
            return Err(AuthError::ProtocolViolation("unexpected result".into()));
        }
        self.state = ChannelState::ResultReceived;

        if result.accepted {
            log::info!(
                "✅ {} succeeded as {} contact",
                CHANNEL_TYPE,
                if result.is_known_contact { "known" } else { "unknown" }
            );
            self.accepted = true;
            if result.is_known_contact {
                self.connection.grant_authentication(AuthPurpose::KnownToPeer, None);
            }
        } else {
            log::warn!("⚠️ {} rejected", CHANNEL_TYPE);
        }

        self.close();
        Ok(())
    }

    // ===== Both directions =====

    /// Handle one packet from the peer
    ///
    /// Malformed packets close the channel without a reply.
    pub fn receive_packet(&mut self, data: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(AuthError::ProtocolViolation(format!(
                "packet received on closed {}",
                CHANNEL_TYPE
            )));
        }

        let packet = match Packet::decode(data) {
            Ok(packet) => packet,
            Err(e) => {
                log::warn!("⚠️ Malformed packet on {}: {}", CHANNEL_TYPE, e);
                self.close();
                return Err(e);
            }
        };

        match packet {
            Packet::Proof(proof) => self.handle_proof(&proof),
            Packet::Result(result) => self.handle_result(&result),
        }
    }

    /// Close the channel
    ///
    /// The first call finalizes the state (`Accepted` only if the
    /// handshake succeeded), frees the channel slot and runs the outcome
    /// handler. Later calls do nothing.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }

        let outcome = if self.accepted {
            self.state = ChannelState::Accepted;
            AuthOutcome::Accepted
        } else {
            self.state = ChannelState::Rejected;
            AuthOutcome::Rejected
        };

        if self.registered {
            self.connection.unregister_channel(CHANNEL_TYPE);
            self.registered = false;
        }

        log::debug!("{} closed: {:?}", CHANNEL_TYPE, outcome);
        if let Some(handler) = self.on_outcome.take() {
            handler(outcome);
        }
    }
}

impl Drop for AuthChannel {
    fn drop(&mut self) {
        self.close();
    }
}
