//! Networking for tetris-battle: lock-step rounds between one host and N clients
//!
//! The host is authoritative. It deals one piece per round from a seeded sequence, waits
//! (bounded) for every active player's placement, settles scores and HP, and holds a
//! ready barrier before the next round. Clients replay the same sequence from the shared
//! seed and report their own score deltas.
//!
//! # Module Structure
//!
//! - [`framing`]: 4-byte big-endian length prefix + JSON body
//! - [`protocol`]: the closed [`Message`] union
//! - [`error`]: [`NetError`]
//! - [`config`]: [`HostConfig`] / [`ClientConfig`] from `TETRIS_BATTLE_*` env vars
//! - [`log_context`]: [`SessionLog`]
//! - [`host`]: registry, listener, round coordinator, settlement, broadcasters
//! - [`client`]: message router and game session

pub mod client;
pub mod config;
pub mod error;
pub mod framing;
pub mod host;
pub mod log_context;
pub mod protocol;

pub use tetris_battle_core as core;
pub use tetris_battle_types as types;

pub use client::{ClientView, GameClient, MessageRouter};
pub use config::{ClientConfig, HostConfig};
pub use error::NetError;
pub use host::{check_tcp_listen_available, run_host};
pub use log_context::SessionLog;
pub use protocol::{GameSummary, Message, MessageKind, PlayerId};

use tokio::sync::watch;

/// Resolve once `rx` carries `true`. Never resolves if the sender is gone while false.
pub(crate) async fn wait_for_signal(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
