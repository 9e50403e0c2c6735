//! Wire protocol for quickchess.
//!
//! - **Types** ([`SessionId`], [`Role`], [`Side`], [`MoveToken`],
//!   [`ServerFrame`], ...): what travels between clients and the server.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become text.
//! - **Errors** ([`ProtocolError`]): what can go wrong while parsing.
//!
//! Inbound frames on a game connection are bare move tokens; outbound
//! frames are tagged JSON objects.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ConnectTarget, ErrorCode, MoveToken, Outcome, OutcomeKind, Role,
    ServerFrame, SessionId, SessionStatus, Side, SideChoice, JOIN_NOTICE,
    LEAVE_NOTICE,
};
