//! Error types for the session layer.

use quickchess_protocol::{ErrorCode, Role, SessionId, Side};

/// Errors that can occur during session operations.
///
/// Every variant except [`Unavailable`](Self::Unavailable) is caused by
/// the client and leaves the session untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No session has this identifier.
    #[error("game {0} not found")]
    NotFound(SessionId),

    /// The token matches none of the legal moves in the current position.
    #[error("illegal move {0:?}")]
    IllegalToken(String),

    /// The sender's side is not the side to move.
    #[error("{role} plays {side} but it is {to_move}'s turn")]
    OutOfTurn { role: Role, side: Side, to_move: Side },

    /// The game has already ended.
    #[error("the game is over")]
    GameOver,

    /// The role already has a live connection and the server rejects
    /// second attaches.
    #[error("{0} is already connected")]
    AlreadyBound(Role),

    /// The sending connection does not (or no longer) hold the role's slot.
    #[error("this connection is not attached as {0}")]
    NotAttached(Role),

    /// The session actor has stopped.
    #[error("game {0} is unavailable")]
    Unavailable(SessionId),
}

impl SessionError {
    /// Returns the wire code reported to the client.
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::NotFound(_) => ErrorCode::SessionNotFound,
            SessionError::IllegalToken(_) => ErrorCode::IllegalToken,
            SessionError::OutOfTurn { .. } => ErrorCode::OutOfTurn,
            SessionError::GameOver => ErrorCode::GameOver,
            SessionError::AlreadyBound(_) => ErrorCode::AlreadyBound,
            SessionError::NotAttached(_) => ErrorCode::NotAttached,
            SessionError::Unavailable(_) => ErrorCode::Unavailable,
        }
    }
}
