//! Board module - the settled cells of one player's playfield
//!
//! Flat row-major storage, `(x, y)` with `y = 0` at the top. Besides collision and line
//! clearing, the board exposes the stack metrics the auto-player ranks placements by and
//! the wire grid sent to spectators.

use arrayvec::ArrayVec;

use crate::types::{cell_code, Cell, PieceKind, BOARD_HEIGHT, BOARD_WIDTH};

/// Total number of cells on the board
const BOARD_SIZE: usize = (BOARD_WIDTH as usize) * (BOARD_HEIGHT as usize);

/// The game board - 10 columns x 20 rows using flat array storage
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    /// Flat array of cells, row-major order (y * WIDTH + x)
    cells: [Cell; BOARD_SIZE],
}

impl Board {
    /// Create a new empty board
    pub fn new() -> Self {
        Self {
            cells: [None; BOARD_SIZE],
        }
    }

    /// Calculate flat index from (x, y) coordinates
    #[inline(always)]
    fn index(x: i8, y: i8) -> Option<usize> {
        if x < 0 || x >= BOARD_WIDTH as i8 || y < 0 || y >= BOARD_HEIGHT as i8 {
            return None;
        }
        Some((y as usize) * (BOARD_WIDTH as usize) + (x as usize))
    }

    /// Get cell at position (x, y)
    /// Returns None if out of bounds
    pub fn get(&self, x: i8, y: i8) -> Option<Cell> {
        Self::index(x, y).map(|idx| self.cells[idx])
    }

    /// Set cell at position (x, y)
    /// Returns false if out of bounds
    pub fn set(&mut self, x: i8, y: i8, cell: Cell) -> bool {
        match Self::index(x, y) {
            Some(idx) => {
                self.cells[idx] = cell;
                true
            }
            None => false,
        }
    }

    /// Check if position is valid (within bounds and empty)
    pub fn is_valid(&self, x: i8, y: i8) -> bool {
        matches!(self.get(x, y), Some(None))
    }

    /// Check if a row is completely filled
    pub fn is_row_full(&self, y: usize) -> bool {
        if y >= BOARD_HEIGHT as usize {
            return false;
        }
        let start = y * BOARD_WIDTH as usize;
        let end = start + BOARD_WIDTH as usize;
        self.cells[start..end].iter().all(|cell| cell.is_some())
    }

    /// Clear all full rows and return the row indices that were cleared (sorted bottom to top)
    /// Uses a two-pointer algorithm with zero-allocation
    pub fn clear_full_rows(&mut self) -> ArrayVec<usize, 4> {
        let mut cleared_rows = ArrayVec::new();
        let width = BOARD_WIDTH as usize;
        let mut write_y = BOARD_HEIGHT as usize;

        // Scan from bottom to top
        for read_y in (0..BOARD_HEIGHT as usize).rev() {
            if self.is_row_full(read_y) {
                // A single piece spans at most 4 rows.
                let _ = cleared_rows.try_push(read_y);
            } else {
                write_y -= 1;
                if write_y != read_y {
                    let src_start = read_y * width;
                    let dst_start = write_y * width;
                    self.cells
                        .copy_within(src_start..src_start + width, dst_start);
                }
            }
        }

        // Clear the remaining rows at the top
        for cell in &mut self.cells[..write_y * width] {
            *cell = None;
        }

        cleared_rows.reverse();
        cleared_rows
    }

    /// Lock a piece onto the board at given position with given shape
    /// Returns true if successful, false if any cell is out of bounds or occupied
    pub fn lock_piece(&mut self, shape: &[(i8, i8)], x: i8, y: i8, kind: PieceKind) -> bool {
        if !shape.iter().all(|&(dx, dy)| self.is_valid(x + dx, y + dy)) {
            return false;
        }

        for &(dx, dy) in shape {
            self.set(x + dx, y + dy, Some(kind));
        }

        true
    }

    /// Check if spawn position is blocked (game over condition)
    pub fn is_spawn_blocked(&self) -> bool {
        !self.is_valid(3, 0) || !self.is_valid(4, 0) || !self.is_valid(5, 0)
    }

    /// Height of the tallest column (0 for an empty board)
    pub fn stack_height(&self) -> u8 {
        let width = BOARD_WIDTH as usize;
        self.cells
            .iter()
            .position(|cell| cell.is_some())
            .map(|idx| BOARD_HEIGHT - (idx / width) as u8)
            .unwrap_or(0)
    }

    /// Count empty cells that have a filled cell somewhere above them
    pub fn holes(&self) -> u32 {
        let mut holes = 0;
        for x in 0..BOARD_WIDTH as i8 {
            let mut covered = false;
            for y in 0..BOARD_HEIGHT as i8 {
                match self.get(x, y) {
                    Some(Some(_)) => covered = true,
                    Some(None) if covered => holes += 1,
                    _ => {}
                }
            }
        }
        holes
    }

    /// Row-major wire grid: 0 = empty, `piece_id + 1` = filled
    pub fn grid(&self) -> Vec<Vec<u8>> {
        self.cells
            .chunks(BOARD_WIDTH as usize)
            .map(|row| row.iter().map(|&cell| cell_code(cell)).collect())
            .collect()
    }

    /// Clear the entire board
    pub fn clear(&mut self) {
        self.cells = [None; BOARD_SIZE];
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
