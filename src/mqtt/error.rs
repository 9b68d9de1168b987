//! Transport-level error types
//!
//! All of these are recoverable. Connect and receive failures make the
//! control loop replace the session; publish failures drop the single
//! key press; decode failures drop the single inbound message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectError {
    /// Socket or protocol failure while opening the session
    #[error("Transport error: {0}")]
    Transport(String),

    /// Broker answered CONNECT with a non-success code
    #[error("Broker refused connection: {0}")]
    Refused(String),

    /// Broker rejected the subscription
    #[error("Subscription to '{0}' rejected")]
    SubscribeRejected(String),

    #[error("{stage} did not complete within {timeout_ms}ms")]
    Timeout { stage: &'static str, timeout_ms: u64 },
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("No live session")]
    NotConnected,

    #[error("Publish to '{topic}' failed: {reason}")]
    Transport { topic: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ReceiveError {
    #[error("No live session")]
    NotConnected,

    /// Underlying connection reported an error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Inbound channel closed, the network driver is gone
    #[error("Inbound channel closed")]
    Closed,

    /// Safety net around a receive call that should never block
    #[error("Message check took {elapsed_ms}ms (limit {limit_ms}ms)")]
    Timeout { elapsed_ms: u64, limit_ms: u64 },
}

/// Malformed inbound payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Expected {expected} characters, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("Non-digit byte {byte:#04x} at position {position}")]
    NonDigit { position: usize, byte: u8 },

    #[error("Key ({x}, {y}) is outside the key grid")]
    KeyOutOfRange { x: u8, y: u8 },

    #[error("Unknown button set {0}")]
    UnknownButtonSet(u8),
}
