//! Turn arbitration: decides whether a submitted token becomes a move.
//!
//! The arbiter owns the position and the move history. Checks run in a
//! fixed order and any failure leaves both untouched:
//!
//! 1. the game must not be over (`GameOver`)
//! 2. the sender's side must be the side to move (`OutOfTurn`)
//! 3. the token must equal the canonical string of a legal move
//!    (`IllegalToken`)
//!
//! Checking the turn before legality means a token from the wrong side is
//! always reported as `OutOfTurn`, whatever it contains.

use quickchess_protocol::{MoveToken, Outcome, Role, Side};
use quickchess_rules::RulesAuthority;

use crate::SessionError;

/// Position plus the ordered history of every applied move.
pub struct TurnArbiter<R: RulesAuthority> {
    rules: R,
    history: Vec<String>,
    outcome: Option<Outcome>,
}

impl<R: RulesAuthority> TurnArbiter<R> {
    /// Starts from the authority's initial position.
    pub fn new() -> Self {
        Self {
            rules: R::new_game(),
            history: Vec::new(),
            outcome: None,
        }
    }

    /// Validates and applies one move for `role`, who plays `side`.
    ///
    /// Returns the outcome if this move ended the game.
    pub fn submit(
        &mut self,
        role: Role,
        side: Side,
        token: &MoveToken,
    ) -> Result<Option<Outcome>, SessionError> {
        if self.outcome.is_some() {
            return Err(SessionError::GameOver);
        }

        let to_move = self.rules.side_to_move();
        if side != to_move {
            return Err(SessionError::OutOfTurn {
                role,
                side,
                to_move,
            });
        }

        let mv = self
            .rules
            .resolve(token.as_str())
            .ok_or_else(|| SessionError::IllegalToken(token.to_string()))?;

        let notation = self.rules.notation(&mv);
        self.rules.apply(&mv);
        self.history.push(notation);
        self.outcome = self.rules.outcome();
        Ok(self.outcome)
    }

    /// Returns the serialized position.
    pub fn fen(&self) -> String {
        self.rules.fen()
    }

    /// Returns every applied move, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn side_to_move(&self) -> Side {
        self.rules.side_to_move()
    }

    /// Returns the canonical string of every move the side to move may
    /// play. Empty once the game is over.
    pub fn legal_moves(&self) -> Vec<String> {
        if self.outcome.is_some() {
            return Vec::new();
        }
        self.rules
            .legal_moves()
            .iter()
            .map(|mv| self.rules.notation(mv))
            .collect()
    }
}
