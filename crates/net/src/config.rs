//! Host and client configuration, read from `TETRIS_BATTLE_*` environment variables.

use std::env;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use crate::error::NetError;
use crate::types::{DEFAULT_STARTING_HP, MAX_HP};

/// Smallest collect budget accepted from the environment.
pub const MIN_ENV_COLLECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Host configuration
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub host: String,
    pub port: u16,
    /// Remote clients required before the game starts
    pub players_to_start: usize,
    /// Fixed seed; derived from the clock when None
    pub seed: Option<u32>,
    pub starting_hp: u32,
    /// Total budget for collecting placements, split into three equal phases
    pub collect_timeout: Duration,
    pub barrier_timeout: Duration,
    pub prepare_delay: Duration,
    pub handshake_timeout: Duration,
    pub snapshot_interval: Duration,
    pub leaderboard_interval: Duration,
    /// Demote per-round info logs to debug
    pub quiet: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7878,
            players_to_start: 1,
            seed: None,
            starting_hp: DEFAULT_STARTING_HP,
            collect_timeout: Duration::from_secs(30),
            barrier_timeout: Duration::from_secs(10),
            prepare_delay: Duration::from_millis(500),
            handshake_timeout: Duration::from_secs(5),
            snapshot_interval: Duration::from_millis(500),
            leaderboard_interval: Duration::from_millis(250),
            quiet: false,
        }
    }
}

impl HostConfig {
    /// Create from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let collect_timeout = env_parse::<u64>("TETRIS_BATTLE_COLLECT_TIMEOUT_MS")
            .map(Duration::from_millis)
            .map(|d| d.max(MIN_ENV_COLLECT_TIMEOUT))
            .unwrap_or(defaults.collect_timeout);

        Self {
            host: env::var("TETRIS_BATTLE_HOST")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.host),
            port: env_parse("TETRIS_BATTLE_PORT").unwrap_or(defaults.port),
            players_to_start: env_parse("TETRIS_BATTLE_PLAYERS").unwrap_or(defaults.players_to_start),
            seed: env_parse("TETRIS_BATTLE_SEED"),
            starting_hp: env_parse("TETRIS_BATTLE_STARTING_HP").unwrap_or(defaults.starting_hp),
            collect_timeout,
            barrier_timeout: env_parse::<u64>("TETRIS_BATTLE_BARRIER_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.barrier_timeout),
            ..defaults
        }
    }

    /// Starting HP clamped to `1..=MAX_HP`
    pub fn effective_starting_hp(&self) -> u32 {
        self.starting_hp.clamp(1, MAX_HP)
    }

    /// Length of each of the three collection phases
    pub fn collect_phase(&self) -> Duration {
        self.collect_timeout / 3
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, NetError> {
        resolve(&self.host, self.port)
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    /// How long to wait for `StartGame` after joining
    pub start_timeout: Duration,
    pub quiet: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            start_timeout: Duration::from_secs(600),
            quiet: false,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            connect_timeout: env_parse::<u64>("TETRIS_BATTLE_CONNECT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_timeout),
            ..defaults
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Resolve `host:port`, accepting both literal addresses and hostnames.
pub fn resolve(host: &str, port: u16) -> Result<SocketAddr, NetError> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            NetError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("no address for {}:{}", host, port),
            ))
        })
}
