//! Tetris battle runner (default binary).
//!
//! `host` opens a game and, unless `--spectate` is given, takes a seat with the built-in
//! auto-player. `join` connects to a host and plays with the same auto-player.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use tetris_battle::core::AutoPlayer;
use tetris_battle::net::{
    run_host, ClientConfig, GameClient, GameSummary, HostConfig, NetError,
};

#[derive(Parser)]
#[command(name = "tetris-battle")]
#[command(about = "Lock-step multiplayer Tetris battle")]
struct Args {
    /// Only log warnings and per-game milestones
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Host a game
    Host {
        /// Address to bind (defaults to TETRIS_BATTLE_HOST or 127.0.0.1)
        #[arg(short, long)]
        bind: Option<String>,

        /// Port to listen on (defaults to TETRIS_BATTLE_PORT or 7878)
        #[arg(short, long)]
        port: Option<u16>,

        /// Remote players required before the game starts
        #[arg(long)]
        players: Option<usize>,

        /// Piece sequence seed (defaults to the clock; 0 deals the same pieces as 1)
        #[arg(long)]
        seed: Option<u32>,

        /// Referee only; the host does not play
        #[arg(long)]
        spectate: bool,
    },
    /// Join a hosted game
    Join {
        /// Host address, e.g. 127.0.0.1:7878
        addr: String,

        /// Display name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupt received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    match args.command {
        Command::Host {
            bind,
            port,
            players,
            seed,
            spectate,
        } => {
            let mut config = HostConfig::from_env();
            if let Some(bind) = bind {
                config.host = bind;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(players) = players {
                config.players_to_start = players;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            config.quiet = args.quiet;

            let host_player: Option<Box<dyn tetris_battle::core::PiecePlayer>> = if spectate {
                None
            } else {
                Some(Box::new(AutoPlayer::new()))
            };

            match run_host(config, host_player, None, shutdown_rx).await {
                Ok(summary) => print_summary(&summary),
                Err(NetError::Cancelled) => {}
                Err(e) => return Err(e).context("hosting failed"),
            }
        }
        Command::Join { addr, name } => {
            let config = ClientConfig {
                quiet: args.quiet,
                ..ClientConfig::from_env()
            };
            let mut client = GameClient::connect(addr.as_str(), &name, config)
                .await
                .with_context(|| format!("could not join {}", addr))?;
            println!("Joined as {}", client.player_id());

            let mut player = AutoPlayer::new();
            let mut shutdown = shutdown_rx;
            let outcome = tokio::select! {
                outcome = client.play(&mut player) => outcome,
                Ok(_) = shutdown.wait_for(|stop| *stop) => Err(NetError::Cancelled),
            };

            match outcome {
                Ok(summary) => print_summary(&summary),
                Err(NetError::Cancelled) => {}
                Err(NetError::HostDisconnected) => {
                    eprintln!("The host closed the connection. The game has ended.");
                    std::process::exit(1);
                }
                Err(e) => return Err(e).context("game session failed"),
            }
        }
    }

    Ok(())
}

fn print_summary(summary: &GameSummary) {
    println!("Game over after {} round(s)", summary.rounds_played);
    match &summary.winner_id {
        Some(id) => println!("Winner: {}", id),
        None => println!("No winner"),
    }

    let mut standings: Vec<_> = summary.stats.iter().collect();
    standings.sort_by(|a, b| b.1.score.cmp(&a.1.score));
    for (id, stats) in standings {
        println!(
            "  {:<10} {:<16} score {:>6}  hp {:>3}{}",
            id,
            stats.name,
            stats.score,
            stats.hp,
            if stats.is_spectator { "  (out)" } else { "" }
        );
    }
}
