//! Engine module - the single-board rules the round core calls once per piece
//!
//! The network core only needs four things from a board: move, rotate, hard drop + lock
//! (yielding the score delta a client reports), and the spawn-blocked game-over test.
//! [`BoardEngine`] names that seam; [`LocalBoard`] is the built-in implementation.

use crate::board::Board;
use crate::pieces::{get_shape, try_rotate, SPAWN_POSITION};
use crate::scoring::line_clear_score;
use crate::types::{PieceKind, Rotation};

/// Active falling piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tetromino {
    pub kind: PieceKind,
    pub rotation: Rotation,
    pub x: i8,
    pub y: i8,
}

impl Tetromino {
    /// Create a new tetromino at spawn position
    pub fn new(kind: PieceKind) -> Self {
        Self {
            kind,
            rotation: Rotation::North,
            x: SPAWN_POSITION.0,
            y: SPAWN_POSITION.1,
        }
    }

    /// Get the shape (mino offsets) for current rotation
    pub fn shape(&self) -> [(i8, i8); 4] {
        get_shape(self.kind, self.rotation)
    }

    /// Check if all minos are at valid positions on the board
    pub fn fits(&self, board: &Board) -> bool {
        self.shape()
            .iter()
            .all(|&(dx, dy)| board.is_valid(self.x + dx, self.y + dy))
    }
}

/// Outcome of locking a piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockResult {
    /// Whether the piece actually locked onto the board
    pub locked: bool,
    pub lines_cleared: u32,
    pub score_delta: u32,
}

/// Single-board rules used by a participant to play its round piece.
pub trait BoardEngine {
    /// Place `kind` at the spawn position. Returns false if it does not fit.
    fn spawn(&mut self, kind: PieceKind) -> bool;
    fn try_move(&mut self, dx: i8, dy: i8) -> bool;
    fn try_rotate(&mut self, clockwise: bool) -> bool;
    /// Drop the active piece to the floor, lock it and clear lines.
    fn hard_drop_and_lock(&mut self) -> LockResult;
    fn is_spawn_blocked(&self) -> bool;
    /// Row-major wire grid of the settled cells.
    fn grid(&self) -> Vec<Vec<u8>>;
}

/// Board plus the piece currently being positioned
#[derive(Debug, Clone, Default)]
pub struct LocalBoard {
    board: Board,
    active: Option<Tetromino>,
}

impl LocalBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn active(&self) -> Option<Tetromino> {
        self.active
    }

    /// Wipe the board (used after a top-out so the player can keep going)
    pub fn clear(&mut self) {
        self.board.clear();
        self.active = None;
    }
}

impl BoardEngine for LocalBoard {
    fn spawn(&mut self, kind: PieceKind) -> bool {
        let piece = Tetromino::new(kind);
        if piece.fits(&self.board) {
            self.active = Some(piece);
            true
        } else {
            self.active = None;
            false
        }
    }

    fn try_move(&mut self, dx: i8, dy: i8) -> bool {
        let Some(active) = self.active else {
            return false;
        };

        let moved = Tetromino {
            x: active.x + dx,
            y: active.y + dy,
            ..active
        };
        if moved.fits(&self.board) {
            self.active = Some(moved);
            true
        } else {
            false
        }
    }

    fn try_rotate(&mut self, clockwise: bool) -> bool {
        let Some(active) = self.active else {
            return false;
        };

        if active.kind == PieceKind::O {
            return false;
        }

        let result = try_rotate(
            active.kind,
            active.rotation,
            active.x,
            active.y,
            clockwise,
            |x, y| self.board.is_valid(x, y),
        );

        match result {
            Some((rotation, (dx, dy))) => {
                self.active = Some(Tetromino {
                    rotation,
                    x: active.x + dx,
                    y: active.y + dy,
                    ..active
                });
                true
            }
            None => false,
        }
    }

    fn hard_drop_and_lock(&mut self) -> LockResult {
        let Some(active) = self.active.take() else {
            return LockResult::default();
        };

        let mut landed = active;
        loop {
            let below = Tetromino {
                y: landed.y + 1,
                ..landed
            };
            if !below.fits(&self.board) {
                break;
            }
            landed = below;
        }

        if !self
            .board
            .lock_piece(&landed.shape(), landed.x, landed.y, landed.kind)
        {
            return LockResult::default();
        }

        let lines_cleared = self.board.clear_full_rows().len() as u32;
        LockResult {
            locked: true,
            lines_cleared,
            score_delta: line_clear_score(lines_cleared),
        }
    }

    fn is_spawn_blocked(&self) -> bool {
        self.board.is_spawn_blocked()
    }

    fn grid(&self) -> Vec<Vec<u8>> {
        self.board.grid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BOARD_HEIGHT, BOARD_WIDTH};

    #[test]
    fn test_spawn_and_move() {
        let mut engine = LocalBoard::new();
        assert!(engine.spawn(PieceKind::T));
        assert!(engine.try_move(1, 0));
        assert_eq!(engine.active().unwrap().x, SPAWN_POSITION.0 + 1);

        // Walk into the left wall.
        let mut steps = 0;
        while engine.try_move(-1, 0) {
            steps += 1;
        }
        assert!(steps > 0);
        assert_eq!(engine.active().unwrap().x, 0);
    }

    #[test]
    fn test_o_piece_does_not_rotate() {
        let mut engine = LocalBoard::new();
        engine.spawn(PieceKind::O);
        assert!(!engine.try_rotate(true));
    }

    #[test]
    fn test_hard_drop_lands_on_floor() {
        let mut engine = LocalBoard::new();
        engine.spawn(PieceKind::O);
        let result = engine.hard_drop_and_lock();
        assert!(result.locked);
        assert_eq!(result.lines_cleared, 0);
        assert_eq!(result.score_delta, 0);
        assert!(engine.board().get(4, BOARD_HEIGHT as i8 - 1).unwrap().is_some());
        assert!(engine.active().is_none());
    }

    #[test]
    fn test_hard_drop_clears_line_and_scores() {
        let mut engine = LocalBoard::new();
        // Bottom row filled except the four columns an I piece will cover.
        for x in 4..BOARD_WIDTH as i8 {
            engine.board.set(x, BOARD_HEIGHT as i8 - 1, Some(PieceKind::J));
        }
        engine.spawn(PieceKind::I);
        while engine.try_move(-1, 0) {}

        let result = engine.hard_drop_and_lock();
        assert_eq!(result.lines_cleared, 1);
        assert_eq!(result.score_delta, 100);
        assert_eq!(engine.board().stack_height(), 0);
    }

    #[test]
    fn test_spawn_fails_on_blocked_board() {
        let mut engine = LocalBoard::new();
        engine.board.set(4, 0, Some(PieceKind::Z));
        engine.board.set(5, 1, Some(PieceKind::Z));
        assert!(engine.is_spawn_blocked());
        assert!(!engine.spawn(PieceKind::T));
        assert_eq!(engine.hard_drop_and_lock(), LockResult::default());
    }
}
