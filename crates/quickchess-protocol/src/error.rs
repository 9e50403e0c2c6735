//! Error types for the protocol layer.
//!
//! When you see a `ProtocolError`, the problem is in how something was
//! written on the wire, not in networking or in the game itself.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into a frame).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The connection target did not name a role and a session.
    ///
    /// Targets look like `/player1/<id>` or `/?role=player1&game-id=<id>`.
    #[error("invalid connection target: {0}")]
    InvalidTarget(String),

    /// The message is well-formed bytes but not a valid message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
