//! Codec trait and implementations for turning frames into text.
//!
//! The rest of the server never calls `serde_json` directly; it goes
//! through a [`Codec`], so the wire format can change in one place.

use serde::Serialize;

use crate::ProtocolError;

/// Encodes outbound values into text frames.
///
/// Inbound game frames are bare move tokens and never go through a codec.
///
/// `Send + Sync + 'static` because one codec is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented
    /// in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Browser clients read frames with `JSON.parse`, so JSON text frames are
/// what the server speaks.
///
/// ## Example
///
/// ```rust
/// use quickchess_protocol::{Codec, JsonCodec, ServerFrame};
///
/// let codec = JsonCodec;
/// let frame = ServerFrame::Moves { moves: vec!["e2e4".into()] };
///
/// let text = codec.encode(&frame).unwrap();
/// assert_eq!(text, r#"{"type":"move","moves":["e2e4"]}"#);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }
}
