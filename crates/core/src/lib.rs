//! Core game logic module - pure, deterministic, and testable
//!
//! Everything a participant needs to agree on the game without talking to anyone:
//! the shared-seed piece sequence, the single-board rules, and the battle scoring table.
//! It has **zero dependencies** on networking or I/O.
//!
//! - **Deterministic**: the same seed yields the same pieces on every machine
//! - **Testable**: unit tests for every rule
//! - **Headless**: [`AutoPlayer`] plays a round piece without any UI
//!
//! # Module Structure
//!
//! - [`rng`]: LCG + 7-bag [`PieceSequencer`] shared by host and clients
//! - [`board`]: 10x20 grid with collision detection and line clearing
//! - [`pieces`]: Tetromino shapes and SRS rotation with wall kicks
//! - [`engine`]: the [`BoardEngine`] seam and its [`LocalBoard`] implementation
//! - [`scoring`]: lines ↔ score delta mapping
//! - [`player`]: the [`PiecePlayer`] trait and the greedy [`AutoPlayer`]
//!
//! # Example
//!
//! ```
//! use tetris_battle_core::{PieceSequencer, AutoPlayer, PiecePlayer};
//!
//! let mut host = PieceSequencer::new(12345);
//! let mut client = PieceSequencer::new(12345);
//! assert_eq!(host.next(), client.next());
//!
//! let mut player = AutoPlayer::new();
//! let piece = host.next();
//! let preview = host.peek(0);
//! let placement = player.play(1, piece, preview);
//! assert!(placement.locks);
//! ```

pub mod board;
pub mod engine;
pub mod pieces;
pub mod player;
pub mod rng;
pub mod scoring;

pub use tetris_battle_types as types;

pub use board::Board;
pub use engine::{BoardEngine, LocalBoard, LockResult, Tetromino};
pub use pieces::{get_shape, try_rotate};
pub use player::{AutoPlayer, PiecePlayer, Placement};
pub use rng::{seed_from_clock, PieceSequencer, SimpleRng};
pub use scoring::{accepted_delta, line_clear_score, lines_for_score};
