//! Error types for the fleet synchronization engine
//!
//! Error taxonomy using thiserror. None of these are fatal to the host
//! process: decode errors drop one message, connection errors drive the
//! reconnect loop, teardown errors are reported and then ignored.

use thiserror::Error;

/// Rejection of a single inbound payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed payload: {reason}")]
    Malformed { reason: String },

    #[error("Missing or non-numeric coordinate: {field}")]
    MissingCoordinates { field: &'static str },
}

impl DecodeError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::Malformed { .. } => "malformed",
            DecodeError::MissingCoordinates { .. } => "missing_coordinates",
        }
    }
}

/// Transport-level connect/subscribe failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Connect to {endpoint} failed: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    #[error("Subscribe to {topic} failed: {reason}")]
    SubscribeFailed { topic: String, reason: String },

    #[error("Handshake with {endpoint} timed out")]
    HandshakeTimeout { endpoint: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),
}

/// Failure to release a transport session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TeardownError {
    #[error("Disconnect failed: {reason}")]
    DisconnectFailed { reason: String },
}

/// Misuse of the connection lifecycle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Session already activated")]
    AlreadyActivated,

    #[error("Session deactivated; construct a new manager to reconnect")]
    Deactivated,
}
