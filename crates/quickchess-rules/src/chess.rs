//! Standard chess over `shakmaty`.

use quickchess_protocol::{Outcome, Side};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position};

use crate::RulesAuthority;

/// A standard chess game.
///
/// Moves are spelled in UCI long algebraic notation: `e2e4`, `e1g1` for
/// castling (the king's two-square move), and `e7e8q` for a promotion.
#[derive(Debug, Clone, Default)]
pub struct ChessRules {
    pos: Chess,
}

fn side(color: Color) -> Side {
    match color {
        Color::White => Side::White,
        Color::Black => Side::Black,
    }
}

impl RulesAuthority for ChessRules {
    type Move = Move;

    fn new_game() -> Self {
        Self::default()
    }

    fn legal_moves(&self) -> Vec<Move> {
        self.pos.legal_moves().into_iter().collect()
    }

    fn notation(&self, mv: &Move) -> String {
        mv.to_uci(CastlingMode::Standard).to_string()
    }

    fn apply(&mut self, mv: &Move) {
        self.pos.play_unchecked(mv);
    }

    fn side_to_move(&self) -> Side {
        side(self.pos.turn())
    }

    fn outcome(&self) -> Option<Outcome> {
        if self.pos.is_checkmate() {
            // The side to move has been mated.
            Some(Outcome::Checkmate {
                winner: side(self.pos.turn()).opposite(),
            })
        } else if self.pos.is_stalemate() {
            Some(Outcome::Stalemate)
        } else if self.pos.is_insufficient_material() {
            Some(Outcome::Draw)
        } else {
            None
        }
    }

    fn fen(&self) -> String {
        Fen(self.pos.clone().into_setup(EnPassantMode::Legal)).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str =
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn play(rules: &mut ChessRules, tokens: &[&str]) {
        for token in tokens {
            let mv = rules
                .resolve(token)
                .unwrap_or_else(|| panic!("{token} should be legal"));
            rules.apply(&mv);
        }
    }

    #[test]
    fn test_new_game_is_standard_start() {
        let rules = ChessRules::new_game();
        assert_eq!(rules.fen(), START_FEN);
        assert_eq!(rules.side_to_move(), Side::White);
        assert_eq!(rules.legal_moves().len(), 20);
        assert!(rules.outcome().is_none());
    }

    #[test]
    fn test_resolve_exact_match_only() {
        let rules = ChessRules::new_game();
        assert!(rules.resolve("e2e4").is_some());
        assert!(rules.resolve("E2E4").is_none());
        assert!(rules.resolve("e2-e4").is_none());
        assert!(rules.resolve("e4").is_none());
        assert!(rules.resolve("e2e5").is_none());
    }

    #[test]
    fn test_apply_advances_turn_and_fen() {
        let mut rules = ChessRules::new_game();
        play(&mut rules, &["e2e4"]);
        assert_eq!(rules.side_to_move(), Side::Black);
        assert!(rules.fen().starts_with("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b"));
    }

    #[test]
    fn test_castling_uses_king_two_square_token() {
        let mut rules = ChessRules::new_game();
        play(&mut rules, &["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "g8f6"]);
        assert!(rules.resolve("e1h1").is_none());
        play(&mut rules, &["e1g1"]);
        assert!(rules.fen().contains("RNBQ1RK1"));
    }

    #[test]
    fn test_promotion_requires_piece_suffix() {
        let mut rules = ChessRules::new_game();
        play(
            &mut rules,
            &["a2a4", "b7b5", "a4b5", "a7a6", "b5a6", "c8b7", "a6a7", "b7c6"],
        );
        // a8 is blocked by the rook; the only promotions capture on b8.
        assert!(rules.resolve("a7b8").is_none());
        assert!(rules.resolve("a7b8q").is_some());
        assert!(rules.resolve("a7b8n").is_some());
    }

    #[test]
    fn test_fools_mate_is_checkmate_for_black() {
        let mut rules = ChessRules::new_game();
        play(&mut rules, &["f2f3", "e7e5", "g2g4", "d8h4"]);
        assert_eq!(
            rules.outcome(),
            Some(Outcome::Checkmate { winner: Side::Black })
        );
        assert!(rules.legal_moves().is_empty());
    }
}
