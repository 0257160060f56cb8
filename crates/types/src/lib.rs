//! Shared types module - data structures and constants used across the workspace
//!
//! Everything here is plain data with no external dependencies, so it can be used by the
//! board engine, the round coordinator and the wire protocol alike.
//!
//! The playfield is 10 columns by 20 rows, row 0 at the top.
//!
//! # Piece Identifiers
//!
//! Pieces travel over the wire as small integers in `0..7`:
//!
//! | Id | Piece |
//! |----|-------|
//! | 0 | I |
//! | 1 | O |
//! | 2 | T |
//! | 3 | S |
//! | 4 | Z |
//! | 5 | J |
//! | 6 | L |
//!
//! # Examples
//!
//! ```
//! use tetris_battle_types::{PieceKind, Rotation, BOARD_WIDTH, BOARD_HEIGHT};
//!
//! // Piece ids round-trip
//! assert_eq!(PieceKind::from_id(2), Some(PieceKind::T));
//! assert_eq!(PieceKind::T.id(), 2);
//!
//! // Rotate
//! assert_eq!(Rotation::North.rotate_cw(), Rotation::East);
//!
//! // Board dimensions
//! assert_eq!(BOARD_WIDTH, 10);
//! assert_eq!(BOARD_HEIGHT, 20);
//! ```

/// Board width in cells (10 columns)
pub const BOARD_WIDTH: u8 = 10;

/// Board height in cells (20 rows)
pub const BOARD_HEIGHT: u8 = 20;

/// Number of distinct piece kinds (ids are `0..PIECE_COUNT`)
pub const PIECE_COUNT: u8 = 7;

/// Upper bound for a player's hit points
pub const MAX_HP: u32 = 100;

/// Hit points a player starts a game with unless configured otherwise
pub const DEFAULT_STARTING_HP: u32 = 10;

/// Consecutive missed rounds after which a player is treated as gone
pub const MISSED_ROUND_LIMIT: u32 = 3;

/// Player id the host uses for its own seat at the table
pub const HOST_PLAYER_ID: &str = "host";

/// Score delta indexed by lines cleared with one piece
pub const LINE_SCORES: [u32; 5] = [0, 100, 300, 500, 800];

/// The seven tetrominoes, declared in wire-id order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl PieceKind {
    /// All kinds in id order.
    pub const ALL: [PieceKind; 7] = [
        PieceKind::I,
        PieceKind::O,
        PieceKind::T,
        PieceKind::S,
        PieceKind::Z,
        PieceKind::J,
        PieceKind::L,
    ];

    /// Map a wire id (`0..7`) to a piece kind
    ///
    /// # Examples
    ///
    /// ```
    /// use tetris_battle_types::PieceKind;
    ///
    /// assert_eq!(PieceKind::from_id(0), Some(PieceKind::I));
    /// assert_eq!(PieceKind::from_id(6), Some(PieceKind::L));
    /// assert_eq!(PieceKind::from_id(7), None);
    /// ```
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Wire id of this piece kind
    pub fn id(&self) -> u8 {
        *self as u8
    }

    /// Lowercase letter used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            PieceKind::I => "i",
            PieceKind::O => "o",
            PieceKind::T => "t",
            PieceKind::S => "s",
            PieceKind::Z => "z",
            PieceKind::J => "j",
            PieceKind::L => "l",
        }
    }
}

/// SRS orientation, in clockwise order starting from spawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    North,
    East,
    South,
    West,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::North,
        Rotation::East,
        Rotation::South,
        Rotation::West,
    ];

    /// Position in [`Rotation::ALL`], also the row in the shape tables.
    pub fn index(self) -> usize {
        self as usize
    }

    /// ```
    /// use tetris_battle_types::Rotation;
    ///
    /// assert_eq!(Rotation::North.rotate_cw(), Rotation::East);
    /// assert_eq!(Rotation::West.rotate_cw(), Rotation::North);
    /// ```
    pub fn rotate_cw(&self) -> Self {
        Self::ALL[(self.index() + 1) % 4]
    }

    pub fn rotate_ccw(&self) -> Self {
        Self::ALL[(self.index() + 3) % 4]
    }
}

/// A settled board cell; `None` is empty
pub type Cell = Option<PieceKind>;

/// Encode a cell for the wire grid: 0 = empty, `id + 1` = filled.
pub fn cell_code(cell: Cell) -> u8 {
    match cell {
        None => 0,
        Some(kind) => kind.id() + 1,
    }
}
