//! # onion-auth
//!
//! Onion-service identity keys and the hidden-service authentication
//! handshake used between peers that talk over onion connections.
//!
//! A peer that dialed someone else's onion service proves, over the
//! already-open connection, that it owns the private key of its own onion
//! service. The proof is bound to random cookies from both sides, so it
//! cannot be replayed on another connection.
//!
//! ## Architecture
//!
//! ```text
//! AuthChannel (protocol)
//!   ↓
//! IdentityKey (identity)  ──  ContactRegistry / Connection (caller)
//!   ↓
//! Signature engine (crypto)
//!   ↓
//! base32 / base64 (codec)
//! ```
//!
//! ## Features
//!
//! - **Two key generations**: legacy RSA-1024 (16-char service IDs) and
//!   modern Ed25519 (56-char service IDs) behind one [`IdentityKey`] type
//! - **Transport agnostic**: the channel talks to its peer through the
//!   [`Connection`] trait
//! - **Exactly-once outcome**: every channel reports `Accepted` or
//!   `Rejected` once, when it closes
//! - **Control-port helpers**: `ADD_ONION` key provisioning and hashed
//!   control passwords
//!
//! ## Example
//!
//! ```
//! use std::collections::HashSet;
//! use std::sync::Arc;
//! use onion_auth::{AuthChannel, ConnectionDirection, ConnectionState, IdentityKey};
//!
//! # fn main() -> onion_auth::Result<()> {
//! let key = IdentityKey::modern_from_seed(&[7u8; 32])?;
//! let server_host = "wr4azk67ynmtabcd.onion";
//!
//! let client = Arc::new(ConnectionState::new(ConnectionDirection::ClientSide, server_host));
//! let server = Arc::new(ConnectionState::new(ConnectionDirection::ServerSide, server_host));
//!
//! let mut prover = AuthChannel::outbound(client.clone(), key)?;
//! let mut verifier = AuthChannel::inbound(server.clone(), Arc::new(HashSet::<String>::new()));
//!
//! let request = prover.open_request(1)?;
//! let opened = verifier.accept_open_request(&request)?;
//! prover.process_open_result(&opened)?;
//!
//! for (_, packet) in client.take_sent() {
//!     verifier.receive_packet(&packet)?;
//! }
//! for (_, packet) in server.take_sent() {
//!     prover.receive_packet(&packet)?;
//! }
//! assert!(prover.is_accepted());
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod control;
pub mod crypto;
mod error;
pub mod identity;
pub mod protocol;


#[cfg(test)]
mod test_fixtures;

pub use config::AuthConfig;
pub use error::{AuthError, ChannelError, ErrorClass, ErrorCode, Result};
pub use identity::{
    ContactId, ContactIdValidator, ContactRegistry, IdentityKey, KeyFormat, KeyType, KeyVersion,
    Validation,
};
pub use protocol::{
    AuthChannel, AuthOutcome, AuthPurpose, ChannelDirection, ChannelState, Connection,
    ConnectionDirection, ConnectionState,
};
