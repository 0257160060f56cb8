//! Round coordinator - the host's lock-step state machine
//!
//! One pass of the loop is one round:
//!
//! ```text
//! win check -> Prepare -> Distribute -> Collect -> Settle -> Barrier -> (next round | GameOver)
//! ```
//!
//! Every wait is bounded and selects on the shutdown signal. Connection trouble never
//! reaches this loop as an error; it arrives as `Lost` events and missing placements.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};

use crate::config::HostConfig;
use crate::core::{PiecePlayer, PieceSequencer};
use crate::error::NetError;
use crate::host::broadcaster::Broadcasters;
use crate::host::elimination::EliminationPolicy;
use crate::host::listener::InboundEvent;
use crate::host::registry::SharedRegistry;
use crate::host::settle::settle_round;
use crate::host::table::SharedTable;
use crate::log_context::SessionLog;
use crate::protocol::{GameSummary, Message, PlacedPiece, PlayerId};
use crate::types::{PieceKind, HOST_PLAYER_ID};

/// Where the coordinator currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    AwaitStart,
    RoundPrepare,
    RoundDistribute,
    RoundCollect,
    RoundSettle,
    RoundBarrier,
    GameOver,
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundPhase::AwaitStart => "await-start",
            RoundPhase::RoundPrepare => "prepare",
            RoundPhase::RoundDistribute => "distribute",
            RoundPhase::RoundCollect => "collect",
            RoundPhase::RoundSettle => "settle",
            RoundPhase::RoundBarrier => "barrier",
            RoundPhase::GameOver => "game-over",
        };
        f.write_str(name)
    }
}

pub struct RoundCoordinator {
    config: HostConfig,
    registry: SharedRegistry,
    table: SharedTable,
    inbound_rx: mpsc::UnboundedReceiver<InboundEvent>,
    host_player: Option<Box<dyn PiecePlayer>>,
    sequencer: PieceSequencer,
    policy: EliminationPolicy,
    shutdown: watch::Receiver<bool>,
    log: SessionLog,
    phase: RoundPhase,
    round: u32,
}

impl RoundCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: HostConfig,
        seed: u32,
        registry: SharedRegistry,
        table: SharedTable,
        inbound_rx: mpsc::UnboundedReceiver<InboundEvent>,
        host_player: Option<Box<dyn PiecePlayer>>,
        shutdown: watch::Receiver<bool>,
        log: SessionLog,
    ) -> Self {
        Self {
            config,
            registry,
            table,
            inbound_rx,
            host_player,
            sequencer: PieceSequencer::new(seed),
            policy: EliminationPolicy::default(),
            shutdown,
            log,
            phase: RoundPhase::AwaitStart,
            round: 0,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn seed(&self) -> u32 {
        self.sequencer.seed()
    }

    fn enter(&mut self, phase: RoundPhase) {
        self.log
            .debug(format_args!("round {}: {} -> {}", self.round, self.phase, phase));
        self.phase = phase;
    }

    /// Drive the game from lobby to `GameOver`.
    pub async fn run(mut self) -> Result<GameSummary, NetError> {
        self.await_start().await?;

        let broadcasters = Broadcasters::spawn(
            self.registry.clone(),
            self.table.clone(),
            self.config.snapshot_interval,
            self.config.leaderboard_interval,
            self.shutdown.clone(),
            self.log.clone(),
        );

        let result = self.play_rounds().await;
        broadcasters.stop().await;
        result
    }

    async fn play_rounds(&mut self) -> Result<GameSummary, NetError> {
        loop {
            if self.table.read().await.is_decided() {
                return self.finish().await;
            }

            self.round += 1;
            let round = self.round;
            self.table.write().await.begin_round(round);

            let stalled = self.registry.write().await.drop_stalled();
            if !stalled.is_empty() {
                self.log.warn(format_args!(
                    "round {}: dropped {} (not reading)",
                    round,
                    stalled.join(", ")
                ));
            }

            self.enter(RoundPhase::RoundPrepare);
            self.broadcast(&Message::PrepareNextPiece { round }).await;
            self.sleep(self.config.prepare_delay).await?;

            self.enter(RoundPhase::RoundDistribute);
            let piece = self.sequencer.next();
            let preview = self.sequencer.peek(0);
            self.log.round(format_args!(
                "round {}: piece {} (next {})",
                round,
                piece.as_str(),
                preview.as_str()
            ));
            self.broadcast(&Message::NextPiece {
                piece_id: piece.id(),
                preview_piece_id: preview.id(),
                round,
            })
            .await;

            self.enter(RoundPhase::RoundCollect);
            let placements = self.collect(round, piece, preview).await?;

            self.enter(RoundPhase::RoundSettle);
            self.settle(round, &placements).await;

            self.enter(RoundPhase::RoundBarrier);
            self.barrier(round).await?;
        }
    }

    async fn await_start(&mut self) -> Result<(), NetError> {
        self.enter(RoundPhase::AwaitStart);
        let starting_hp = self.config.effective_starting_hp();

        if self.host_player.is_some() {
            self.table
                .write()
                .await
                .seat(HOST_PLAYER_ID, HOST_PLAYER_ID, starting_hp);
        }

        self.log.info(format_args!(
            "waiting for {} player(s) to join",
            self.config.players_to_start
        ));

        while self.seated_remote_players().await < self.config.players_to_start {
            let event = tokio::select! {
                _ = crate::wait_for_signal(&mut self.shutdown) => return Err(NetError::Cancelled),
                event = self.inbound_rx.recv() => event,
            };
            match event {
                Some(event) => {
                    self.handle_event(event).await;
                }
                None => return Err(NetError::Cancelled),
            }
        }

        // Lobby leavers do not take a seat.
        {
            let mut registry = self.registry.write().await;
            let mut table = self.table.write().await;
            for id in registry.dead_ids() {
                registry.forget(&id);
                table.unseat(&id);
            }
            registry.set_game_started();
            table.started = true;
        }

        let seed = self.sequencer.seed();
        self.log.info(format_args!("starting game with seed {}", seed));
        self.broadcast(&Message::StartGame { seed }).await;
        Ok(())
    }

    /// Book-keeping for joins and losses; returns the player message, if any.
    async fn handle_event(&mut self, event: InboundEvent) -> Option<(PlayerId, Message)> {
        match event {
            InboundEvent::Joined {
                player_id,
                name,
                rejoined,
            } => {
                let lobby = {
                    let mut table = self.table.write().await;
                    table.seat(&player_id, &name, self.config.effective_starting_hp());
                    table.lobby()
                };
                self.broadcast(&lobby).await;

                if rejoined && self.table.read().await.started {
                    let seed = self.sequencer.seed();
                    self.log
                        .info(format_args!("{} rejoined at round {}", player_id, self.round));
                    let registry = self.registry.read().await;
                    let _ = registry.send_to(&player_id, &Message::StartGame { seed });
                    let board = self.table.read().await.leaderboard();
                    let _ = registry.send_to(&player_id, &Message::LeaderboardUpdate(board));
                }
                None
            }
            InboundEvent::Lost { player_id } => {
                self.log.debug(format_args!(
                    "{} lost during {}",
                    player_id, self.phase
                ));
                // Lobby seats are only held by connected players.
                let lobby = {
                    let mut table = self.table.write().await;
                    if table.started {
                        None
                    } else {
                        table.unseat(&player_id);
                        Some(table.lobby())
                    }
                };
                if let Some(lobby) = lobby {
                    self.broadcast(&lobby).await;
                }
                None
            }
            InboundEvent::Message { player_id, message } => Some((player_id, message)),
        }
    }

    /// Connected remote players that already have a seat.
    async fn seated_remote_players(&self) -> usize {
        let table = self.table.read().await;
        let registry = self.registry.read().await;
        table
            .players
            .keys()
            .filter(|id| id.as_str() != HOST_PLAYER_ID && registry.is_alive(id))
            .count()
    }

    /// Remote players whose placement (or confirmation) we are still owed.
    async fn expected_players(&self) -> BTreeSet<PlayerId> {
        let table = self.table.read().await;
        let registry = self.registry.read().await;
        table
            .active_ids()
            .into_iter()
            .filter(|id| id != HOST_PLAYER_ID && registry.is_alive(id))
            .collect()
    }

    async fn collect(
        &mut self,
        round: u32,
        piece: PieceKind,
        preview: PieceKind,
    ) -> Result<BTreeMap<PlayerId, PlacedPiece>, NetError> {
        let mut placements = BTreeMap::new();

        let host_active = self.table.read().await.is_active(HOST_PLAYER_ID);
        if let (Some(player), true) = (self.host_player.as_mut(), host_active) {
            let placement = player.play(round, piece, preview);
            let placed = PlacedPiece::from_placement(HOST_PLAYER_ID, round, piece, &placement);
            self.accept_placement(round, placed, &mut placements).await;
        }

        let phase_len = self.config.collect_phase();
        for phase in 1..=3 {
            let deadline = Instant::now() + phase_len;
            loop {
                let missing = self.missing(&placements).await;
                if missing.is_empty() {
                    return Ok(placements);
                }

                let Some(event) = self.next_event(deadline).await? else {
                    self.log.round(format_args!(
                        "round {}: collect phase {}/3 ended, waiting on {}",
                        round,
                        phase,
                        missing.iter().cloned().collect::<Vec<_>>().join(", ")
                    ));
                    break;
                };

                match self.handle_event(event).await {
                    Some((_, Message::PlacedPiece(placed))) => {
                        self.accept_placement(round, placed, &mut placements).await;
                    }
                    Some((player_id, other)) => {
                        self.log.debug(format_args!(
                            "round {}: {:?} from {} while collecting",
                            round,
                            other.kind(),
                            player_id
                        ));
                    }
                    None => {}
                }
            }
        }

        let missing = self.missing(&placements).await;
        if !missing.is_empty() {
            self.log.warn(format_args!(
                "round {}: no placement from {}",
                round,
                missing.into_iter().collect::<Vec<_>>().join(", ")
            ));
        }
        Ok(placements)
    }

    async fn missing(&self, placements: &BTreeMap<PlayerId, PlacedPiece>) -> BTreeSet<PlayerId> {
        self.expected_players()
            .await
            .into_iter()
            .filter(|id| !placements.contains_key(id))
            .collect()
    }

    async fn accept_placement(
        &mut self,
        round: u32,
        placed: PlacedPiece,
        placements: &mut BTreeMap<PlayerId, PlacedPiece>,
    ) {
        if let Some(tagged) = placed.round {
            if tagged != round {
                self.log.debug(format_args!(
                    "round {}: dropping stale placement for round {} from {}",
                    round, tagged, placed.player_id
                ));
                return;
            }
        }
        if placements.contains_key(&placed.player_id) {
            return;
        }

        let mut table = self.table.write().await;
        if !table.is_active(&placed.player_id) {
            return;
        }
        table.placed.insert(placed.player_id.clone());
        if let Some(board) = &placed.board {
            table.boards.insert(placed.player_id.clone(), board.clone());
        }
        drop(table);

        self.log.debug(format_args!(
            "round {}: {} placed, delta {}",
            round, placed.player_id, placed.score_delta
        ));
        placements.insert(placed.player_id.clone(), placed);
    }

    async fn settle(&mut self, round: u32, placements: &BTreeMap<PlayerId, PlacedPiece>) {
        let outcome = {
            let mut table = self.table.write().await;
            settle_round(&mut table.players, placements, &self.policy, round)
        };

        for (player_id, reason) in &outcome.eliminated {
            self.log
                .info(format_args!("round {}: {} eliminated ({})", round, player_id, reason));
            self.broadcast(&Message::PlayerEliminated {
                player_id: player_id.clone(),
                reason: reason.to_string(),
            })
            .await;
        }

        self.log.round(format_args!(
            "round {}: scores {:?} hp {:?}",
            round, outcome.results.new_scores, outcome.results.hp
        ));
        self.broadcast(&Message::RoundResults(outcome.results)).await;
    }

    async fn barrier(&mut self, round: u32) -> Result<(), NetError> {
        self.broadcast(&Message::WaitForNextRound {
            round,
            message: format!("Round {} complete, waiting for players", round),
        })
        .await;
        self.broadcast(&Message::RoundReadyRequest { round }).await;

        let mut pending = self.expected_players().await;
        let deadline = Instant::now() + self.config.barrier_timeout;

        while !pending.is_empty() {
            let Some(event) = self.next_event(deadline).await? else {
                break;
            };
            match self.handle_event(event).await {
                Some((player_id, Message::RoundReadyConfirmation { round: confirmed }))
                    if confirmed == round =>
                {
                    pending.remove(&player_id);
                }
                Some((player_id, Message::PlacedPiece(_))) => {
                    self.log.debug(format_args!(
                        "round {}: late placement from {} ignored",
                        round, player_id
                    ));
                }
                _ => {}
            }
            // Players that dropped are no longer owed a confirmation.
            let registry = self.registry.read().await;
            pending.retain(|id| registry.is_alive(id));
        }

        if !pending.is_empty() {
            self.log.warn(format_args!(
                "round {}: {} did not confirm",
                round,
                pending.into_iter().collect::<Vec<_>>().join(", ")
            ));
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<GameSummary, NetError> {
        self.enter(RoundPhase::GameOver);
        let (winner_id, stats) = {
            let table = self.table.read().await;
            (table.winner(), table.final_stats())
        };

        self.log.info(format_args!(
            "game over after {} round(s), winner: {}",
            self.round,
            winner_id.as_deref().unwrap_or("none")
        ));
        self.broadcast(&Message::GameOver {
            winner_id: winner_id.clone(),
            stats: stats.clone(),
        })
        .await;

        Ok(GameSummary {
            winner_id,
            rounds_played: self.round,
            stats,
        })
    }

    /// Next inbound event before `deadline`; `None` on timeout.
    async fn next_event(&mut self, deadline: Instant) -> Result<Option<InboundEvent>, NetError> {
        tokio::select! {
            _ = crate::wait_for_signal(&mut self.shutdown) => Err(NetError::Cancelled),
            received = time::timeout_at(deadline, self.inbound_rx.recv()) => match received {
                Ok(Some(event)) => Ok(Some(event)),
                Ok(None) => {
                    time::sleep_until(deadline).await;
                    Ok(None)
                }
                Err(_) => Ok(None),
            },
        }
    }

    async fn sleep(&mut self, duration: std::time::Duration) -> Result<(), NetError> {
        tokio::select! {
            _ = crate::wait_for_signal(&mut self.shutdown) => Err(NetError::Cancelled),
            _ = time::sleep(duration) => Ok(()),
        }
    }

    async fn broadcast(&self, msg: &Message) {
        if let Err(e) = self.registry.read().await.broadcast(msg) {
            self.log
                .warn(format_args!("failed to broadcast {:?}: {}", msg.kind(), e));
        }
    }
}
