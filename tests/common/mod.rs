#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use tetris_battle::core::{lines_for_score, PiecePlayer, Placement};
use tetris_battle::net::{run_host, ClientConfig, GameClient, GameSummary, HostConfig, NetError};
use tetris_battle::types::PieceKind;

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Host config with timeouts short enough for tests
pub fn fast_config(players_to_start: usize, seed: u32) -> HostConfig {
    HostConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        players_to_start,
        seed: Some(seed),
        collect_timeout: ms(600),
        barrier_timeout: ms(300),
        prepare_delay: ms(10),
        snapshot_interval: ms(50),
        leaderboard_interval: ms(50),
        quiet: true,
        ..HostConfig::default()
    }
}

pub struct RunningHost {
    pub addr: SocketAddr,
    pub shutdown: watch::Sender<bool>,
    pub handle: JoinHandle<Result<GameSummary, NetError>>,
}

impl RunningHost {
    pub async fn stop(self) -> Result<GameSummary, NetError> {
        let _ = self.shutdown.send(true);
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("host did not stop")
            .expect("host task panicked")
    }
}

pub async fn start_host(
    config: HostConfig,
    host_player: Option<Box<dyn PiecePlayer>>,
) -> RunningHost {
    let (ready_tx, ready_rx) = oneshot::channel();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(run_host(config, host_player, Some(ready_tx), shutdown_rx));

    let addr = tokio::time::timeout(Duration::from_secs(2), ready_rx)
        .await
        .expect("host did not signal ready")
        .expect("ready channel dropped");

    RunningHost {
        addr,
        shutdown,
        handle,
    }
}

pub async fn join(addr: SocketAddr, name: &str) -> GameClient {
    GameClient::connect(addr, name, ClientConfig::default())
        .await
        .expect("join failed")
}

/// Reports the same delta every round
pub struct FixedPlayer {
    pub delta: i64,
}

impl PiecePlayer for FixedPlayer {
    fn play(&mut self, _round: u32, _piece: PieceKind, _preview: PieceKind) -> Placement {
        Placement {
            score_delta: self.delta,
            lines_cleared: lines_for_score(self.delta),
            locks: true,
            board: None,
        }
    }
}

/// Let a client play in the background until the session ends.
pub fn spawn_play(mut client: GameClient, delta: i64) -> JoinHandle<Result<GameSummary, NetError>> {
    tokio::spawn(async move {
        let mut player = FixedPlayer { delta };
        client.play(&mut player).await
    })
}
