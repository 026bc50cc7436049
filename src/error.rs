//! Crate-level error type.
//!
//! Each layer owns a narrow error enum describing exactly what can fail
//! there; [`LinkError`] aggregates them for callers that do not care which
//! layer produced the failure.
//!
//! | Error                 | Raised by      | Recovery                           |
//! |-----------------------|----------------|------------------------------------|
//! | [`HandshakeError`]    | provisioning   | caller retries with backoff        |
//! | [`TransportError`]    | connection     | session reconnects                 |
//! | [`FrameError`]        | codec          | frame dropped                      |
//! | [`ControlParseError`] | message parser | message dropped                    |
//! | [`SendError`]         | session sends  | returned to the producer           |
//!
//! Nothing in this crate terminates the host process.

use thiserror::Error;

use crate::codec::FrameError;
use crate::protocol::ControlParseError;
use crate::provision::HandshakeError;
use crate::session::{SendError, TransitionError};
use crate::transport::TransportError;

/// voxlink errors.
#[derive(Error, Debug)]
pub enum LinkError {
    /// Provisioning exchange failed.
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Connection-level failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Malformed binary frame.
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Malformed control message.
    #[error("Control message error: {0}")]
    Control(#[from] ControlParseError),

    /// Outbound send rejected.
    #[error("Send error: {0}")]
    Send(#[from] SendError),

    /// Session asked to make a transition its state does not allow.
    #[error("State error: {0}")]
    State(#[from] TransitionError),

    /// Session was closed while the operation was in flight.
    #[error("Session closed")]
    Closed,

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Loopback server error.
    #[error("Server error: {0}")]
    Server(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for voxlink operations
pub type Result<T> = std::result::Result<T, LinkError>;

impl From<toml::de::Error> for LinkError {
    fn from(err: toml::de::Error) -> Self {
        LinkError::Config(err.to_string())
    }
}

impl LinkError {
    /// Whether retrying the operation later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LinkError::Handshake(_) | LinkError::Transport(_))
    }
}
