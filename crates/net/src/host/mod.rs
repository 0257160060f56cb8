//! Host side: listener, registry, round coordinator and broadcasters.

pub mod broadcaster;
pub mod coordinator;
pub mod elimination;
pub mod listener;
pub mod registry;
pub mod settle;
pub mod table;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::HostConfig;
use crate::core::{seed_from_clock, PiecePlayer};
use crate::error::NetError;
use crate::log_context::SessionLog;
use crate::protocol::GameSummary;

pub use coordinator::{RoundCoordinator, RoundPhase};
pub use elimination::{EliminationPolicy, Verdict};
pub use listener::{check_tcp_listen_available, InboundEvent};
pub use registry::{ConnectionRegistry, Registration, SharedRegistry};
pub use settle::{settle_round, RoundOutcome};
pub use table::{GameTable, PlayerRecord, SharedTable};

/// Host one game on `config`'s address.
///
/// `host_player` takes the host's own seat (`"host"`); pass `None` to only referee.
/// The bound address is sent on `ready_tx` once the socket is listening. Returns the final
/// standings, or [`NetError::Cancelled`] if `shutdown` fires first.
pub async fn run_host(
    config: HostConfig,
    host_player: Option<Box<dyn PiecePlayer>>,
    ready_tx: Option<oneshot::Sender<SocketAddr>>,
    shutdown: watch::Receiver<bool>,
) -> Result<GameSummary, NetError> {
    let log = SessionLog::new("Host", config.quiet);

    let listener = TcpListener::bind(config.socket_addr()?).await?;
    let bound = listener.local_addr()?;
    log.info(format_args!("listening on {}", bound));
    if let Some(tx) = ready_tx {
        let _ = tx.send(bound);
    }

    let seed = config.seed.unwrap_or_else(seed_from_clock);
    let registry = ConnectionRegistry::shared();
    let table = GameTable::shared();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (closing_tx, closing_rx) = watch::channel(false);

    let accept_task = tokio::spawn(listener::accept_loop(
        listener,
        registry.clone(),
        inbound_tx.clone(),
        config.handshake_timeout,
        closing_rx,
        log.clone(),
    ));

    let coordinator = RoundCoordinator::new(
        config,
        seed,
        registry.clone(),
        table,
        inbound_rx,
        host_player,
        shutdown,
        log.clone(),
    );
    let result = coordinator.run().await;

    // Writers flush what is queued (GameOver included) and close their sockets.
    let _ = closing_tx.send(true);
    registry.write().await.close_all();
    let _ = accept_task.await;
    drop(inbound_tx);

    match &result {
        Ok(_) => log.info(format_args!("host stopped")),
        Err(e) => log.warn(format_args!("host stopped: {}", e)),
    }
    result
}
