//! Error types for the probe harness.
//!
//! Transport failures (URI, handshake, framing, I/O) are folded into
//! [`Error::Connection`] or [`Error::Send`] at the endpoint boundary, so a test
//! only ever has to match on the handful of variants that describe what went
//! wrong from its own point of view.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for probe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a WebSocket endpoint under test.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Opening the session failed (bad URI, TCP connect, or upgrade handshake).
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Writing a stimulus to the live session failed.
    #[error("Send failed: {0}")]
    Send(String),

    /// No message arrived before the deadline.
    #[error("Timeout: no message received within {0:?}")]
    Timeout(Duration),

    /// A message arrived but its payload did not match the expectation.
    #[error("Unexpected message: expected {expected}, got {actual:?}")]
    UnexpectedMessage {
        /// Description of what was expected.
        expected: String,
        /// The payload actually received.
        actual: String,
    },

    /// A message arrived during a window in which none was expected.
    #[error("Extra message received: {0:?}")]
    ExtraMessage(String),

    /// The connection actor is no longer accepting stimuli.
    #[error("Connection actor stopped")]
    ActorStopped,

    /// A test case panicked.
    #[error("Test panicked: {0}")]
    Panicked(String),

    /// The URI is not a supported `ws://` URI.
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// The server's upgrade response was rejected.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Malformed frame received from the server.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Frame or message size exceeds the configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// The peer closed the session.
    #[error("Connection closed")]
    ConnectionClosed,

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this error is an expectation failure of a single test.
    ///
    /// These are the failures that terminate only the waiting test unit.
    #[must_use]
    pub const fn is_expectation_failure(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::UnexpectedMessage { .. } | Error::ExtraMessage(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
