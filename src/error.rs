//! # Error Types
//!
//! This module defines error types used throughout the paperlink library.
//!
//! | Variant | Meaning | Retried? |
//! |---------|---------|----------|
//! | `Validation` | Bad plane length, malformed status line, bad parameter | never |
//! | `Handshake` | Device answered the handshake with the wrong frame | never |
//! | `Transport` | Port open/read/write/drain/reset failed | never |
//! | `VerificationMismatch` | Device counted a different number of bytes | yes |
//! | `RetriesExhausted` | Verification kept failing | never |
//! | `Timeout` | Detached transfer saw no outcome in time | never |

use std::time::Duration;

use thiserror::Error;

use crate::protocol::handshake::HandshakeMismatch;

/// Main error type for paperlink operations
#[derive(Debug, Error)]
pub enum PaperlinkError {
    /// Input rejected before any I/O took place
    #[error("Validation error: {0}")]
    Validation(String),

    /// Handshake response did not have the expected shape
    #[error("Handshake mismatch: {op}: {reason}")]
    Handshake {
        op: String,
        #[source]
        reason: HandshakeMismatch,
    },

    /// Transport-level errors (connection, I/O)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Device reported a byte count different from the payload length
    #[error("Device received {received} bytes, expected {expected}")]
    VerificationMismatch { expected: usize, received: usize },

    /// Verification failed on every allowed pass
    #[error("Giving up after {attempts} transfer attempts")]
    RetriesExhausted { attempts: u32 },

    /// No success or error signal before the idle timeout
    #[error("Idle timeout of {0:?} exceeded")]
    Timeout(Duration),

    /// Image processing error
    #[error("Image error: {0}")]
    Image(String),

    /// Configuration file error
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PaperlinkError {
    /// Whether a transfer pass may be repeated on the same session.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::VerificationMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_verification_mismatch_is_retryable() {
        let mismatch = PaperlinkError::VerificationMismatch {
            expected: 48000,
            received: 47999,
        };
        assert!(mismatch.is_retryable());
        assert!(!PaperlinkError::Transport("unable to drain".into()).is_retryable());
        assert!(!PaperlinkError::Validation("bad".into()).is_retryable());
        assert!(!PaperlinkError::RetriesExhausted { attempts: 3 }.is_retryable());
    }

    #[test]
    fn test_handshake_message_names_operation() {
        let err = PaperlinkError::Handshake {
            op: "unable to validate handshake response".into(),
            reason: HandshakeMismatch::Trailer(0x00),
        };
        assert!(
            err.to_string()
                .starts_with("Handshake mismatch: unable to validate handshake response: ")
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_messages_carry_context() {
        let err = PaperlinkError::Transport("unable to write chunk #2: broken pipe".into());
        assert_eq!(
            err.to_string(),
            "Transport error: unable to write chunk #2: broken pipe"
        );
    }
}
