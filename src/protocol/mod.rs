//! Hidden-service authentication protocol
//!
//! This module implements the `im.ricochet.auth.hidden-service` channel:
//! - Wire messages (open request, open result, proof, result)
//! - The connection interface the channel runs on
//! - The prover/verifier state machine

mod auth_channel;
mod connection;
mod messages;

pub use auth_channel::{
    proof_data, proof_hmac, AuthChannel, AuthOutcome, ChannelDirection, ChannelState,
    PROOF_DATA_LEN, PROOF_HOSTNAME_LEN,
};
pub use connection::{AuthPurpose, Connection, ConnectionDirection, ConnectionState};
pub use messages::{
    AuthResult, ChannelOpenResult, Cookie, OpenChannelRequest, Packet, Proof, CHANNEL_TYPE,
    COOKIE_EXTENSION_FIELD, COOKIE_LEN,
};
