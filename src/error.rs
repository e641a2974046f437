//! Error types for onion-auth
//!
//! This module provides the error taxonomy shared by every layer:
//! - Detailed error variants for different failure modes
//! - Error classification (key parse / protocol / crypto / invariant)
//! - Error codes for programmatic handling
//!
//! The remote peer never sees any of this. A failed handshake is reported
//! to it only as `accepted: false`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Key errors (1xx)
    KeyParse = 100,
    UnsupportedKeySize = 101,
    Encoding = 102,

    // Protocol errors (2xx)
    ProtocolViolation = 200,
    ChannelRejected = 201,
    SignatureSizeMismatch = 202,

    // Cryptographic errors (3xx) - FATAL
    CryptoFailure = 300,
    EntropyFailure = 301,

    // Programming errors (4xx) - FATAL
    InvariantViolation = 400,
    WrongKeyType = 401,

    // Other (9xx)
    Unsupported = 900,
    ControlReply = 901,
    ConfigInvalid = 902,
}

/// The four failure classes a caller has to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed or unacceptable key material. The caller may retry with
    /// different input.
    KeyParse,
    /// Malformed wire data or misuse by the peer. Always closes the channel.
    ProtocolViolation,
    /// A signing/verification primitive or the RNG failed. Fatal to the
    /// current handshake attempt.
    CryptoFailure,
    /// A precondition guaranteed elsewhere did not hold. A defect in the
    /// calling code.
    InvariantViolation,
    /// Everything else (unsupported operations, control-port replies,
    /// configuration).
    Other,
}

/// Standard error codes a channel-open request can be refused with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelError {
    GenericError = 0,
    UnknownTypeError = 1,
    UnauthorizedError = 2,
    BadUsageError = 3,
    FailedError = 4,
}

/// Main error type for onion-auth
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ===== Key Errors =====
    #[error("Key parse error: {0}")]
    KeyParse(String),

    #[error("Unsupported key size: {bits} bits (expected {expected})")]
    UnsupportedKeySize { bits: usize, expected: usize },

    #[error("Encoding error: {0}")]
    Encoding(String),

    // ===== Protocol Errors =====
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Channel open rejected: {0:?}")]
    ChannelRejected(ChannelError),

    #[error("Signature size mismatch: expected {expected} bytes, got {got}")]
    SignatureSizeMismatch { expected: usize, got: usize },

    // ===== Cryptographic Errors (FATAL) =====
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Entropy/RNG failure: {0}")]
    Entropy(String),

    // ===== Programming Errors (FATAL) =====
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Key type {key} cannot be used to {operation}")]
    WrongKeyType {
        operation: &'static str,
        key: &'static str,
    },

    // ===== Other =====
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Control reply error: {0}")]
    Control(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Get the error code for programmatic handling
    pub fn code(&self) -> ErrorCode {
        match self {
            AuthError::KeyParse(_) => ErrorCode::KeyParse,
            AuthError::UnsupportedKeySize { .. } => ErrorCode::UnsupportedKeySize,
            AuthError::Encoding(_) => ErrorCode::Encoding,

            AuthError::ProtocolViolation(_) => ErrorCode::ProtocolViolation,
            AuthError::ChannelRejected(_) => ErrorCode::ChannelRejected,
            AuthError::SignatureSizeMismatch { .. } => ErrorCode::SignatureSizeMismatch,

            AuthError::Crypto(_) => ErrorCode::CryptoFailure,
            AuthError::Entropy(_) => ErrorCode::EntropyFailure,

            AuthError::InvariantViolation(_) => ErrorCode::InvariantViolation,
            AuthError::WrongKeyType { .. } => ErrorCode::WrongKeyType,

            AuthError::Unsupported(_) => ErrorCode::Unsupported,
            AuthError::Control(_) => ErrorCode::ControlReply,
            AuthError::Config(_) => ErrorCode::ConfigInvalid,
        }
    }

    /// Which of the failure classes this error belongs to
    pub fn class(&self) -> ErrorClass {
        match self {
            AuthError::KeyParse(_)
            | AuthError::UnsupportedKeySize { .. }
            | AuthError::Encoding(_) => ErrorClass::KeyParse,

            AuthError::ProtocolViolation(_)
            | AuthError::ChannelRejected(_)
            | AuthError::SignatureSizeMismatch { .. } => ErrorClass::ProtocolViolation,

            AuthError::Crypto(_) | AuthError::Entropy(_) => ErrorClass::CryptoFailure,

            AuthError::InvariantViolation(_) | AuthError::WrongKeyType { .. } => {
                ErrorClass::InvariantViolation
            }

            AuthError::Unsupported(_) | AuthError::Control(_) | AuthError::Config(_) => {
                ErrorClass::Other
            }
        }
    }

    /// Whether this error is fatal to the current handshake attempt
    ///
    /// Fatal errors are never retried; the channel is closed and the
    /// attempt is reported as failed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::CryptoFailure | ErrorClass::InvariantViolation
        )
    }

    /// Whether the caller may retry with different input
    ///
    /// Only meaningful for key loading. An auth channel closes on any
    /// handshake error, a bad key in a proof included.
    pub fn is_recoverable(&self) -> bool {
        self.class() == ErrorClass::KeyParse
    }

    /// Shorthand for the usual channel-open refusal
    pub fn bad_usage() -> Self {
        AuthError::ChannelRejected(ChannelError::BadUsageError)
    }

    /// Build an invariant violation and log it loudly
    ///
    /// These indicate a bug in the calling code, so they are never
    /// swallowed silently.
    pub fn invariant(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::error!("BUG: {}", msg);
        AuthError::InvariantViolation(msg)
    }
}

impl From<rsa::Error> for AuthError {
    fn from(err: rsa::Error) -> Self {
        AuthError::Crypto(err.to_string())
    }
}

impl From<getrandom::Error> for AuthError {
    fn from(err: getrandom::Error) -> Self {
        AuthError::Entropy(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(AuthError::Crypto("test".into()).is_fatal());
        assert!(AuthError::Entropy("test".into()).is_fatal());
        assert!(AuthError::InvariantViolation("test".into()).is_fatal());
        assert!(AuthError::WrongKeyType {
            operation: "sign",
            key: "LegacyPublic"
        }
        .is_fatal());

        // Non-fatal errors
        assert!(!AuthError::KeyParse("test".into()).is_fatal());
        assert!(!AuthError::bad_usage().is_fatal());
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(AuthError::KeyParse("test".into()).is_recoverable());
        assert!(AuthError::UnsupportedKeySize {
            bits: 2048,
            expected: 1024
        }
        .is_recoverable());

        assert!(!AuthError::ProtocolViolation("test".into()).is_recoverable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AuthError::KeyParse("x".into()).code(), ErrorCode::KeyParse);
        assert_eq!(AuthError::bad_usage().code(), ErrorCode::ChannelRejected);
        assert_eq!(
            AuthError::SignatureSizeMismatch {
                expected: 128,
                got: 64
            }
            .code(),
            ErrorCode::SignatureSizeMismatch
        );
        assert_eq!(AuthError::Entropy("x".into()).code(), ErrorCode::EntropyFailure);
    }

    #[test]
    fn test_size_mismatch_is_not_a_crypto_failure() {
        let err = AuthError::SignatureSizeMismatch {
            expected: 64,
            got: 63,
        };
        assert_eq!(err.class(), ErrorClass::ProtocolViolation);
        assert_ne!(err.class(), AuthError::Crypto("bad".into()).class());
    }

    #[test]
    fn test_bad_usage() {
        assert_eq!(
            AuthError::bad_usage(),
            AuthError::ChannelRejected(ChannelError::BadUsageError)
        );
    }
}
