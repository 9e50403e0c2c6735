//! The `RulesAuthority` trait: the seam between the coordinator and the
//! game rules.

use quickchess_protocol::{Outcome, Side};

/// A game position owned by one session, plus the rules that move it.
///
/// The session actor owns exactly one value of this type and is the only
/// code that ever calls [`apply`](Self::apply), so implementations need
/// `Send` but not `Sync`.
pub trait RulesAuthority: Send + 'static {
    /// A move in the authority's own representation.
    type Move: Clone + Send;

    /// Returns the starting position.
    fn new_game() -> Self;

    /// Lists every legal move in the current position.
    fn legal_moves(&self) -> Vec<Self::Move>;

    /// Returns the canonical long algebraic string for a legal move.
    fn notation(&self, mv: &Self::Move) -> String;

    /// Advances the position. `mv` must come from [`legal_moves`](Self::legal_moves)
    /// of the current position.
    fn apply(&mut self, mv: &Self::Move);

    /// Returns the side whose turn it is.
    fn side_to_move(&self) -> Side;

    /// Returns the terminal outcome, or `None` while the game goes on.
    fn outcome(&self) -> Option<Outcome>;

    /// Serializes the full position (FEN for chess).
    fn fen(&self) -> String;

    /// Finds the legal move whose canonical string equals `token` exactly.
    ///
    /// No normalization happens here: case, separators and suffixes must
    /// match the canonical form.
    fn resolve(&self, token: &str) -> Option<Self::Move> {
        self.legal_moves()
            .into_iter()
            .find(|mv| self.notation(mv) == token)
    }
}
