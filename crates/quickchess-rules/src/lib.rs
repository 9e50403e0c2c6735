//! Rules authority for quickchess.
//!
//! The coordinator never decides on its own whether a move is legal. It
//! asks a [`RulesAuthority`]: the authority lists legal moves in canonical
//! long algebraic notation, applies moves, and reports whose turn it is
//! and whether the game is over.
//!
//! [`ChessRules`] is the standard chess implementation.

mod authority;
mod chess;

pub use authority::RulesAuthority;
pub use chess::ChessRules;
