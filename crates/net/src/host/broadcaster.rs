//! Live state broadcasters - periodic spectator snapshots and leaderboard pushes
//!
//! Both loops only read the shared table and registry. They stop when the game ends
//! (their own stop channel) or on host shutdown.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::host::registry::SharedRegistry;
use crate::host::table::SharedTable;
use crate::log_context::SessionLog;
use crate::protocol::Message;

/// Running broadcaster tasks
pub struct Broadcasters {
    stop: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Broadcasters {
    pub fn spawn(
        registry: SharedRegistry,
        table: SharedTable,
        snapshot_interval: Duration,
        leaderboard_interval: Duration,
        shutdown: watch::Receiver<bool>,
        log: SessionLog,
    ) -> Self {
        let (stop, stop_rx) = watch::channel(false);

        let snapshot = {
            let table = table.clone();
            tokio::spawn(broadcast_loop(
                "spectator snapshot",
                snapshot_interval,
                registry.clone(),
                stop_rx.clone(),
                shutdown.clone(),
                log.clone(),
                move || {
                    let table = table.clone();
                    async move { Message::SpectatorSnapshot(table.read().await.snapshot()) }
                },
            ))
        };

        let leaderboard = tokio::spawn(broadcast_loop(
            "leaderboard",
            leaderboard_interval,
            registry,
            stop_rx,
            shutdown,
            log,
            move || {
                let table = table.clone();
                async move { Message::LeaderboardUpdate(table.read().await.leaderboard()) }
            },
        ));

        Self {
            stop,
            handles: vec![snapshot, leaderboard],
        }
    }

    /// Signal both loops and wait for them to exit.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn broadcast_loop<F, Fut>(
    what: &'static str,
    period: Duration,
    registry: SharedRegistry,
    mut stop: watch::Receiver<bool>,
    mut shutdown: watch::Receiver<bool>,
    log: SessionLog,
    build: F,
) where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Message>,
{
    let mut ticker = time::interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = crate::wait_for_signal(&mut stop) => break,
            _ = crate::wait_for_signal(&mut shutdown) => break,
            _ = ticker.tick() => {}
        }

        let msg = build().await;
        let sent = registry.read().await.broadcast(&msg);
        if let Err(e) = sent {
            log.warn(format_args!("{} tick skipped: {}", what, e));
        }
    }

    log.debug(format_args!("{} broadcaster stopped", what));
}
