//! Tor control-port helpers
//!
//! Only the command text and reply handling live here; the control socket
//! belongs to the caller.

pub mod add_onion;
pub mod hashed_password;

pub use add_onion::{AddOnionCommand, OnionTarget};
pub use hashed_password::hashed_control_password;
