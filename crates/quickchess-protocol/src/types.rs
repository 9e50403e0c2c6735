//! Core protocol types.
//!
//! Everything here either travels on the wire (frames, identifiers, sides)
//! or is parsed from it (move tokens, connection targets).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier of a game session.
///
/// Issued once by the registry at creation and never reused. Serialized as
/// the bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a raw identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the two fixed participant slots of a session.
///
/// `A` is the creator (`player1` on the wire) and `B` the participant who
/// joins later (`player2`). Which side of the board each role plays is
/// decided when the session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "player1")]
    A,
    #[serde(rename = "player2")]
    B,
}

impl Role {
    /// Returns the other role.
    pub fn counterpart(self) -> Role {
        match self {
            Role::A => Role::B,
            Role::B => Role::A,
        }
    }

    /// Returns the wire name (`player1` / `player2`).
    pub fn as_str(self) -> &'static str {
        match self {
            Role::A => "player1",
            Role::B => "player2",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player1" => Ok(Role::A),
            "player2" => Ok(Role::B),
            other => Err(ProtocolError::InvalidTarget(format!(
                "unknown role {other:?}"
            ))),
        }
    }
}

/// A side of play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// Returns the opposing side.
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::White => "white",
            Side::Black => "black",
        })
    }
}

/// The side a session creator asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideChoice {
    White,
    Black,
    /// Let the server pick.
    Random,
}

/// Lifecycle state of a session.
///
/// ```text
/// AwaitingOpponent → Active → Terminated
/// ```
///
/// Transitions only move forward. `AwaitingOpponent → Terminated` is
/// allowed when a game ends before the second role ever attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    AwaitingOpponent,
    Active,
    Terminated,
}

impl SessionStatus {
    /// Returns `true` once the game has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Terminated)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::AwaitingOpponent => "awaiting_opponent",
            SessionStatus::Active => "active",
            SessionStatus::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Terminal result of a game as reported by the rules authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Checkmate { winner: Side },
    Stalemate,
    /// Drawn for any other reason (e.g. insufficient material).
    Draw,
}

impl Outcome {
    /// Returns the winning side, if the game was decisive.
    pub fn winner(self) -> Option<Side> {
        match self {
            Outcome::Checkmate { winner } => Some(winner),
            Outcome::Stalemate | Outcome::Draw => None,
        }
    }

    /// Returns the flat outcome name.
    pub fn kind(self) -> OutcomeKind {
        match self {
            Outcome::Checkmate { .. } => OutcomeKind::Checkmate,
            Outcome::Stalemate => OutcomeKind::Stalemate,
            Outcome::Draw => OutcomeKind::Draw,
        }
    }
}

/// The flat outcome name used in `gameOver` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Checkmate,
    Stalemate,
    Draw,
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A candidate ply in long algebraic form, e.g. `e2e4` or `e7e8q`.
///
/// This is just text: it only becomes a move once it has been matched
/// against the rules authority's legal-move list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveToken(String);

impl MoveToken {
    /// Wraps a token string as-is.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Parses one inbound frame into a token.
    ///
    /// Surrounding whitespace is stripped. Returns `Ok(None)` for a frame
    /// that is empty after trimming.
    pub fn from_frame(data: &[u8]) -> Result<Option<Self>, ProtocolError> {
        let text = std::str::from_utf8(data).map_err(|_| {
            ProtocolError::InvalidMessage("move token is not UTF-8".into())
        })?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self(text.to_string())))
    }

    /// Returns the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MoveToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `(role, session)` pair a persistent connection was opened for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub role: Role,
    pub session_id: SessionId,
}

impl ConnectTarget {
    /// Parses the request target of a connection upgrade.
    ///
    /// Accepts the path form `/player1/<id>` and the query form
    /// `/?role=player1&game-id=<id>` (`session` is accepted for `game-id`).
    pub fn parse(target: &str) -> Result<Self, ProtocolError> {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        let segments: Vec<&str> =
            path.split('/').filter(|s| !s.is_empty()).collect();
        if let [role, id] = segments.as_slice() {
            return Ok(Self {
                role: role.parse()?,
                session_id: SessionId::new(*id),
            });
        }

        let Some(query) = query else {
            return Err(ProtocolError::InvalidTarget(format!(
                "expected /<player>/<game-id>, got {target:?}"
            )));
        };

        let mut role = None;
        let mut session_id = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("role" | "player", value)) => role = Some(value.parse()?),
                Some(("game-id" | "session", value)) if !value.is_empty() => {
                    session_id = Some(SessionId::new(value));
                }
                _ => {}
            }
        }

        match (role, session_id) {
            (Some(role), Some(session_id)) => Ok(Self { role, session_id }),
            _ => Err(ProtocolError::InvalidTarget(format!(
                "query must carry role and game-id, got {target:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Machine-readable failure kind carried by error frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    SessionNotFound,
    IllegalToken,
    OutOfTurn,
    GameOver,
    AlreadyBound,
    /// The connection was replaced by a newer one for the same role.
    Evicted,
    /// A move arrived from a connection that no longer holds its role.
    NotAttached,
    BadRequest,
    Unavailable,
}

/// Notice text for a participant joining.
pub const JOIN_NOTICE: &str = "A player has joined the game.";
/// Notice text for a participant leaving.
pub const LEAVE_NOTICE: &str = "A player has left the game.";

/// A frame the server sends to a participant.
///
/// Every frame is an internally tagged JSON object; the `type` field tells
/// kinds apart:
///
/// ```text
/// {"type":"FEN","content":"rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"}
/// {"type":"move","moves":["e2e4"]}
/// {"type":"error","code":"out_of_turn","content":"it is white's turn"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// Full position serialization.
    #[serde(rename = "FEN")]
    Fen { content: String },

    /// Every move applied so far, in order.
    #[serde(rename = "move")]
    Moves { moves: Vec<String> },

    /// The game has ended.
    #[serde(rename = "gameOver")]
    GameOver {
        outcome: OutcomeKind,
        winner: Option<Side>,
    },

    /// The other participant attached.
    #[serde(rename = "join")]
    Join { content: String },

    /// The other participant's connection went away.
    #[serde(rename = "leave")]
    Leave { content: String },

    /// A request from this connection failed.
    #[serde(rename = "error")]
    Error { code: ErrorCode, content: String },
}

impl ServerFrame {
    /// Builds an error frame.
    pub fn error(code: ErrorCode, content: impl Into<String>) -> Self {
        Self::Error {
            code,
            content: content.into(),
        }
    }

    /// Builds the frame announcing a terminal outcome.
    pub fn game_over(outcome: Outcome) -> Self {
        Self::GameOver {
            outcome: outcome.kind(),
            winner: outcome.winner(),
        }
    }

    pub fn join() -> Self {
        Self::Join {
            content: JOIN_NOTICE.to_string(),
        }
    }

    pub fn leave() -> Self {
        Self::Leave {
            content: LEAVE_NOTICE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("player1".parse::<Role>().unwrap(), Role::A);
        assert_eq!("player2".parse::<Role>().unwrap(), Role::B);
        assert!("player3".parse::<Role>().is_err());
        assert_eq!(Role::B.to_string(), "player2");
        assert_eq!(Role::A.counterpart(), Role::B);
    }

    #[test]
    fn test_side_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Side::White).unwrap(), "\"white\"");
        assert_eq!(Side::Black.opposite(), Side::White);
    }

    #[test]
    fn test_side_choice_deserializes_random() {
        let choice: SideChoice = serde_json::from_str("\"random\"").unwrap();
        assert_eq!(choice, SideChoice::Random);
    }

    #[test]
    fn test_status_order_is_lifecycle_order() {
        assert!(SessionStatus::AwaitingOpponent < SessionStatus::Active);
        assert!(SessionStatus::Active < SessionStatus::Terminated);
        assert!(SessionStatus::Terminated.is_terminal());
    }

    #[test]
    fn test_move_token_from_frame_trims() {
        let token = MoveToken::from_frame(b"  e2e4\n").unwrap().unwrap();
        assert_eq!(token.as_str(), "e2e4");
    }

    #[test]
    fn test_move_token_from_empty_frame_is_none() {
        assert!(MoveToken::from_frame(b" \t").unwrap().is_none());
    }

    #[test]
    fn test_move_token_from_non_utf8_frame_fails() {
        let result = MoveToken::from_frame(&[0xff, 0xfe]);
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_connect_target_path_form() {
        let target = ConnectTarget::parse("/player2/Xk3aZ9").unwrap();
        assert_eq!(target.role, Role::B);
        assert_eq!(target.session_id.as_str(), "Xk3aZ9");
    }

    #[test]
    fn test_connect_target_query_form() {
        let target =
            ConnectTarget::parse("/?role=player1&game-id=abc").unwrap();
        assert_eq!(target.role, Role::A);
        assert_eq!(target.session_id, SessionId::new("abc"));
    }

    #[test]
    fn test_connect_target_missing_session_fails() {
        assert!(ConnectTarget::parse("/player1").is_err());
        assert!(ConnectTarget::parse("/?role=player1").is_err());
        assert!(ConnectTarget::parse("/").is_err());
    }

    #[test]
    fn test_connect_target_unknown_role_fails() {
        let result = ConnectTarget::parse("/spectator/abc");
        assert!(matches!(result, Err(ProtocolError::InvalidTarget(_))));
    }

    #[test]
    fn test_fen_frame_wire_shape() {
        let frame = ServerFrame::Fen {
            content: "8/8/8/8/8/8/8/8 w - - 0 1".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "FEN");
        assert_eq!(json["content"], "8/8/8/8/8/8/8/8 w - - 0 1");
    }

    #[test]
    fn test_move_frame_wire_shape() {
        let frame = ServerFrame::Moves {
            moves: vec!["e2e4".into(), "e7e5".into()],
        };
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "move");
        assert_eq!(json["moves"], serde_json::json!(["e2e4", "e7e5"]));
    }

    #[test]
    fn test_error_frame_wire_shape() {
        let frame = ServerFrame::error(ErrorCode::OutOfTurn, "not your turn");
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "out_of_turn");
        assert_eq!(json["content"], "not your turn");
    }

    #[test]
    fn test_game_over_frame_carries_winner() {
        let frame = ServerFrame::game_over(Outcome::Checkmate {
            winner: Side::Black,
        });
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "gameOver");
        assert_eq!(json["outcome"], "checkmate");
        assert_eq!(json["winner"], "black");

        let draw = serde_json::to_value(ServerFrame::game_over(Outcome::Draw))
            .unwrap();
        assert!(draw["winner"].is_null());
    }
}
