//! Player module - whoever decides where a round's piece goes
//!
//! Both the host's own seat and headless clients play through [`PiecePlayer`]. The reported
//! [`Placement`] is exactly what travels to the host in a `PlacedPiece` message.

use crate::engine::{BoardEngine, LocalBoard};
use crate::types::{PieceKind, Rotation};

/// What a participant reports after playing one round's piece
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Placement {
    pub score_delta: i64,
    pub lines_cleared: u32,
    /// False when the piece could not be placed (topped out)
    pub locks: bool,
    /// Row-major board after the placement, for spectators
    pub board: Option<Vec<Vec<u8>>>,
}

/// Plays one piece per round.
pub trait PiecePlayer: Send + Sync {
    fn play(&mut self, round: u32, piece: PieceKind, preview: PieceKind) -> Placement;
}

/// Greedy headless player: tries every rotation and column, keeps the best landing.
///
/// Ranking is most lines cleared, then fewest holes, then lowest stack.
#[derive(Debug, Clone, Default)]
pub struct AutoPlayer {
    engine: LocalBoard,
}

impl AutoPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine(&self) -> &LocalBoard {
        &self.engine
    }

    /// Simulate one landing on a scratch copy; returns (lines, holes, height).
    fn evaluate(&self, piece: PieceKind, turns: usize, shift: i8) -> Option<(u32, u32, u8)> {
        let mut scratch = self.engine.clone();
        Self::steer(&mut scratch, piece, turns, shift)?;
        let result = scratch.hard_drop_and_lock();
        if !result.locked {
            return None;
        }
        let board = scratch.board();
        Some((result.lines_cleared, board.holes(), board.stack_height()))
    }

    /// Spawn, rotate `turns` times clockwise and shift horizontally by `shift`.
    fn steer(engine: &mut LocalBoard, piece: PieceKind, turns: usize, shift: i8) -> Option<()> {
        if !engine.spawn(piece) {
            return None;
        }
        for _ in 0..turns {
            if !engine.try_rotate(true) {
                return None;
            }
        }
        let step = shift.signum();
        for _ in 0..shift.abs() {
            if !engine.try_move(step, 0) {
                return None;
            }
        }
        Some(())
    }
}

impl PiecePlayer for AutoPlayer {
    fn play(&mut self, round: u32, piece: PieceKind, _preview: PieceKind) -> Placement {
        if self.engine.is_spawn_blocked() {
            log::debug!("round {}: board topped out, clearing", round);
            self.engine.clear();
            return Placement {
                score_delta: 0,
                lines_cleared: 0,
                locks: false,
                board: Some(self.engine.grid()),
            };
        }

        let turns_available = if piece == PieceKind::O {
            1
        } else {
            Rotation::ALL.len()
        };

        let mut best: Option<((u32, u32, u8), usize, i8)> = None;
        for turns in 0..turns_available {
            for shift in -5..=6 {
                let Some(score) = self.evaluate(piece, turns, shift) else {
                    continue;
                };
                let better = match best {
                    None => true,
                    Some(((lines, holes, height), _, _)) => {
                        (score.0, std::cmp::Reverse(score.1), std::cmp::Reverse(score.2))
                            > (lines, std::cmp::Reverse(holes), std::cmp::Reverse(height))
                    }
                };
                if better {
                    best = Some((score, turns, shift));
                }
            }
        }

        let result = match best {
            Some((_, turns, shift)) => {
                let _ = Self::steer(&mut self.engine, piece, turns, shift);
                self.engine.hard_drop_and_lock()
            }
            None => {
                // Nothing fits anywhere but the spawn cell was free; lock where it spawned.
                self.engine.spawn(piece);
                self.engine.hard_drop_and_lock()
            }
        };

        Placement {
            score_delta: i64::from(result.score_delta),
            lines_cleared: result.lines_cleared,
            locks: result.locked,
            board: Some(self.engine.grid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::PieceSequencer;

    #[test]
    fn auto_player_completes_a_line_when_possible() {
        let mut player = AutoPlayer::new();
        // Three O pieces settle flat across columns 0-5 of the bottom two rows.
        for _ in 0..3 {
            let placement = player.play(0, PieceKind::O, PieceKind::O);
            assert_eq!(placement.lines_cleared, 0);
        }
        assert_eq!(player.engine().board().stack_height(), 2);

        // A flat I piece fills columns 6-9 of the floor row.
        let placement = player.play(1, PieceKind::I, PieceKind::I);
        assert!(placement.locks);
        assert_eq!(placement.lines_cleared, 1);
        assert_eq!(placement.score_delta, 100);
    }

    #[test]
    fn auto_player_keeps_scoring_over_a_long_sequence() {
        let mut player = AutoPlayer::new();
        let mut seq = PieceSequencer::new(12345);
        let mut total_lines = 0;
        for round in 1..=200 {
            let piece = seq.next();
            let preview = seq.peek(0);
            let placement = player.play(round, piece, preview);
            assert!(placement.score_delta >= 0);
            assert_eq!(placement.board.as_ref().map(|g| g.len()), Some(20));
            total_lines += placement.lines_cleared;
        }
        assert!(total_lines > 0);
    }

    #[test]
    fn topped_out_board_reports_no_lock_and_resets() {
        let mut player = AutoPlayer::new();
        player
            .engine
            .board_mut()
            .set(4, 0, Some(PieceKind::Z));
        assert!(player.engine().is_spawn_blocked());

        let placement = player.play(7, PieceKind::T, PieceKind::L);
        assert!(!placement.locks);
        assert_eq!(placement.score_delta, 0);
        assert!(!player.engine().is_spawn_blocked());
    }
}
