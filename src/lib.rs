//! Tetris battle (workspace facade crate).
//!
//! Re-exports the member crates under one name: `tetris_battle::{core, net, types}`.
//! The implementation lives in dedicated crates under `crates/`.

pub use tetris_battle_core as core;
pub use tetris_battle_net as net;
pub use tetris_battle_types as types;
