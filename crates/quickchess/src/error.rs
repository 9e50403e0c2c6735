//! Unified error type for the quickchess server.

use quickchess_protocol::ProtocolError;
use quickchess_session::SessionError;
use quickchess_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum QuickchessError {
    /// A transport-level error (accept, upgrade, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (bad target, undecodable frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (not found, illegal move, already bound).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Binding or serving the HTTP listener failed.
    #[error("http server: {0}")]
    Io(#[from] std::io::Error),
}
