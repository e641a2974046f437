//! The connection an auth channel runs on
//!
//! The transport that multiplexes channels over an onion connection lives
//! outside this crate. [`Connection`] is the slice of it the auth channel
//! needs; [`ConnectionState`] is a self-contained implementation that
//! records outgoing packets instead of writing them anywhere.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which end of the connection we are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionDirection {
    /// We dialed the peer's onion service
    ClientSide,
    /// The peer dialed our onion service
    ServerSide,
}

/// What a connection has been authenticated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthPurpose {
    /// The peer proved it owns an onion service identity
    HiddenService,
    /// The peer told us it knows us as a contact
    KnownToPeer,
}

/// Per-connection services used by the auth channel
///
/// All methods take `&self`; implementations guard their own state, since
/// several channels may be opened on one connection concurrently.
pub trait Connection: Send + Sync {
    fn direction(&self) -> ConnectionDirection;

    /// Onion hostname of the server end of this connection
    fn server_hostname(&self) -> String;

    fn has_authenticated(&self, purpose: AuthPurpose) -> bool;

    /// Record an authentication, optionally tied to the peer's identity
    fn grant_authentication(&self, purpose: AuthPurpose, identity: Option<String>);

    /// Claim the single slot for `channel_type`
    ///
    /// Must be an atomic test-and-set: returns `false` if another channel
    /// of this type already holds the slot.
    fn try_register_channel(&self, channel_type: &str) -> bool;

    fn unregister_channel(&self, channel_type: &str);

    /// Send one channel packet to the peer
    fn send_packet(&self, channel_type: &str, packet: Vec<u8>) -> Result<()>;
}

#[derive(Default)]
struct Inner {
    channels: HashSet<String>,
    authenticated: HashMap<AuthPurpose, Option<String>>,
    outbox: Vec<(String, Vec<u8>)>,
}

/// In-memory [`Connection`]
///
/// Packets passed to `send_packet` are queued and handed out by
/// [`take_sent`](Self::take_sent); whoever owns the transport forwards them.
pub struct ConnectionState {
    direction: ConnectionDirection,
    server_hostname: String,
    inner: Mutex<Inner>,
}

impl ConnectionState {
    pub fn new(direction: ConnectionDirection, server_hostname: impl Into<String>) -> Self {
        Self {
            direction,
            server_hostname: server_hostname.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Drain the packets sent so far, oldest first
    pub fn take_sent(&self) -> Vec<(String, Vec<u8>)> {
        std::mem::take(&mut self.inner.lock().outbox)
    }

    /// The identity an authentication was granted for, if any
    pub fn authenticated_identity(&self, purpose: AuthPurpose) -> Option<String> {
        self.inner.lock().authenticated.get(&purpose).cloned().flatten()
    }

    pub fn has_channel(&self, channel_type: &str) -> bool {
        self.inner.lock().channels.contains(channel_type)
    }
}

impl Connection for ConnectionState {
    fn direction(&self) -> ConnectionDirection {
        self.direction
    }

    fn server_hostname(&self) -> String {
        self.server_hostname.clone()
    }

    fn has_authenticated(&self, purpose: AuthPurpose) -> bool {
        self.inner.lock().authenticated.contains_key(&purpose)
    }

    fn grant_authentication(&self, purpose: AuthPurpose, identity: Option<String>) {
        log::info!(
            "🔐 Connection authenticated for {:?}{}",
            purpose,
            identity
                .as_deref()
                .map(|id| format!(" as {}", id))
                .unwrap_or_default()
        );
        self.inner.lock().authenticated.insert(purpose, identity);
    }

    fn try_register_channel(&self, channel_type: &str) -> bool {
        self.inner.lock().channels.insert(channel_type.to_string())
    }

    fn unregister_channel(&self, channel_type: &str) {
        self.inner.lock().channels.remove(channel_type);
    }

    fn send_packet(&self, channel_type: &str, packet: Vec<u8>) -> Result<()> {
        log::trace!("Queued {} byte packet on {}", packet.len(), channel_type);
        self.inner
            .lock()
            .outbox
            .push((channel_type.to_string(), packet));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_channel_slot_is_exclusive() {
        let conn = ConnectionState::new(ConnectionDirection::ServerSide, "x.onion");
        assert!(conn.try_register_channel("a"));
        assert!(!conn.try_register_channel("a"));
        assert!(conn.try_register_channel("b"));
        conn.unregister_channel("a");
        assert!(conn.try_register_channel("a"));
    }

    #[test]
    fn test_concurrent_registration_has_one_winner() {
        let conn = Arc::new(ConnectionState::new(ConnectionDirection::ServerSide, "x.onion"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let conn = Arc::clone(&conn);
                std::thread::spawn(move || conn.try_register_channel("auth"))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_authentication_records_identity() {
        let conn = ConnectionState::new(ConnectionDirection::ServerSide, "x.onion");
        assert!(!conn.has_authenticated(AuthPurpose::HiddenService));
        conn.grant_authentication(AuthPurpose::HiddenService, Some("peer.onion".into()));
        conn.grant_authentication(AuthPurpose::KnownToPeer, None);
        assert!(conn.has_authenticated(AuthPurpose::HiddenService));
        assert_eq!(
            conn.authenticated_identity(AuthPurpose::HiddenService).as_deref(),
            Some("peer.onion")
        );
        assert_eq!(conn.authenticated_identity(AuthPurpose::KnownToPeer), None);
    }

    #[test]
    fn test_sent_packets_drain_in_order() {
        let conn = ConnectionState::new(ConnectionDirection::ClientSide, "x.onion");
        conn.send_packet("auth", vec![1]).unwrap();
        conn.send_packet("auth", vec![2]).unwrap();
        let sent = conn.take_sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1, vec![1]);
        assert!(conn.take_sent().is_empty());
    }
}
