//! Client session - connect, then play one piece per round in lock-step with the host.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;

use crate::client::router::MessageRouter;
use crate::config::ClientConfig;
use crate::core::{PiecePlayer, PieceSequencer, Placement};
use crate::error::NetError;
use crate::framing::{
    encode_message, outbound_channel, read_frame, spawn_frame_writer, write_frame, FrameBytes,
};
use crate::log_context::SessionLog;
use crate::protocol::{
    create_connect_request, GameSummary, LeaderboardUpdate, Message, MessageKind, PlacedPiece,
    PlayerId, RoundResults, SpectatorSnapshot,
};
use crate::types::PieceKind;

/// Messages that drive the round loop, taken strictly in arrival order
const ROUND_KINDS: [MessageKind; 7] = [
    MessageKind::PrepareNextPiece,
    MessageKind::NextPiece,
    MessageKind::RoundResults,
    MessageKind::PlayerEliminated,
    MessageKind::WaitForNextRound,
    MessageKind::RoundReadyRequest,
    MessageKind::GameOver,
];

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Read-only picture of the game for a renderer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientView {
    pub player_id: PlayerId,
    pub round: u32,
    pub current_piece: Option<PieceKind>,
    pub preview_piece: Option<PieceKind>,
    pub is_spectator: bool,
    pub scores: BTreeMap<PlayerId, u32>,
    pub hp: BTreeMap<PlayerId, u32>,
    pub spectators: Vec<PlayerId>,
    pub player_names: BTreeMap<PlayerId, String>,
    pub players_placed: Vec<PlayerId>,
    pub last_results: Option<RoundResults>,
    pub snapshot: Option<SpectatorSnapshot>,
    pub game_over: Option<GameSummary>,
}

/// A joined connection to a host
pub struct GameClient {
    player_id: PlayerId,
    rejoined: bool,
    router: Arc<MessageRouter>,
    tx: mpsc::Sender<FrameBytes>,
    view_tx: watch::Sender<ClientView>,
    log: SessionLog,
    config: ClientConfig,
    reader_task: JoinHandle<()>,
    _writer_task: JoinHandle<()>,
}

impl GameClient {
    /// Connect and complete the handshake.
    ///
    /// The `ConnectResponse` is read directly off the socket before the router starts.
    pub async fn connect(
        addr: impl ToSocketAddrs,
        name: &str,
        config: ClientConfig,
    ) -> Result<Self, NetError> {
        let handshake = async {
            let stream = TcpStream::connect(addr).await?;
            let _ = stream.set_nodelay(true);
            let (mut reader, mut writer) = stream.into_split();

            write_frame(&mut writer, &create_connect_request(name)).await?;
            match read_frame(&mut reader).await? {
                Some(Message::ConnectResponse {
                    player_id,
                    success: true,
                    rejoined,
                    ..
                }) => Ok::<_, NetError>((reader, writer, player_id, rejoined)),
                Some(Message::ConnectResponse { error, .. }) => Err(NetError::Rejected(
                    error.unwrap_or_else(|| "no reason given".to_string()),
                )),
                Some(other) => Err(NetError::Rejected(format!(
                    "expected ConnectResponse, got {:?}",
                    other.kind()
                ))),
                None => Err(NetError::HostDisconnected),
            }
        };

        let (reader, writer, player_id, rejoined) = time::timeout(config.connect_timeout, handshake)
            .await
            .map_err(|_| NetError::Timeout("connect response"))??;

        let log = SessionLog::new(format!("Client {}", player_id), config.quiet);
        log.info(format_args!(
            "{} as '{}'",
            if rejoined { "rejoined" } else { "joined" },
            name
        ));

        let router = MessageRouter::new();
        let reader_task = router.spawn(reader, log.clone());
        let (tx, rx) = outbound_channel();
        let writer_task = spawn_frame_writer(writer, rx);
        let (view_tx, _) = watch::channel(ClientView {
            player_id: player_id.clone(),
            ..ClientView::default()
        });

        Ok(Self {
            player_id,
            rejoined,
            router,
            tx,
            view_tx,
            log,
            config,
            reader_task,
            _writer_task: writer_task,
        })
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn rejoined(&self) -> bool {
        self.rejoined
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    pub fn is_connected(&self) -> bool {
        self.router.is_connected()
    }

    /// Subscribe to the read-only game view.
    pub fn view(&self) -> watch::Receiver<ClientView> {
        self.view_tx.subscribe()
    }

    pub fn try_take(&self, kind: MessageKind) -> Option<Message> {
        self.router.try_take(kind)
    }

    pub async fn take_timeout(&self, kind: MessageKind, timeout: Duration) -> Option<Message> {
        self.router.take_timeout(kind, timeout).await
    }

    pub fn drain_latest(&self, kind: MessageKind) -> Option<Message> {
        self.router.drain_latest(kind)
    }

    /// Queue a message for the host.
    pub fn send(&self, msg: &Message) -> Result<(), NetError> {
        let bytes = encode_message(msg)?;
        self.tx.try_send(bytes).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NetError::Io(io::Error::new(
                io::ErrorKind::WouldBlock,
                "outbound queue full",
            )),
            mpsc::error::TrySendError::Closed(_) => NetError::HostDisconnected,
        })
    }

    pub fn send_placement(
        &self,
        round: u32,
        piece: PieceKind,
        placement: &Placement,
    ) -> Result<(), NetError> {
        let placed = PlacedPiece::from_placement(&self.player_id, round, piece, placement);
        self.send(&Message::PlacedPiece(placed))
    }

    pub fn confirm_ready(&self, round: u32) -> Result<(), NetError> {
        self.send(&Message::RoundReadyConfirmation { round })
    }

    /// Wait for the seed from `StartGame`.
    pub async fn wait_for_seed(&self, timeout: Duration) -> Result<u32, NetError> {
        let mut seed_rx = self.router.subscribe_seed();
        let wait = async {
            loop {
                if let Some(seed) = *seed_rx.borrow_and_update() {
                    return Ok(seed);
                }
                if !self.router.is_connected() {
                    return Err(NetError::HostDisconnected);
                }
                if seed_rx.changed().await.is_err() {
                    return Err(NetError::HostDisconnected);
                }
            }
        };
        time::timeout(timeout, wait)
            .await
            .map_err(|_| NetError::Timeout("game start"))?
    }

    /// Fold the latest periodic broadcasts into the view.
    fn absorb_broadcasts(&self) {
        let leaderboard = match self.router.drain_latest(MessageKind::LeaderboardUpdate) {
            Some(Message::LeaderboardUpdate(board)) => Some(board),
            _ => None,
        };
        let snapshot = match self.router.drain_latest(MessageKind::SpectatorSnapshot) {
            Some(Message::SpectatorSnapshot(snapshot)) => Some(snapshot),
            _ => None,
        };
        let _ = self.router.drain_latest(MessageKind::LobbyUpdate);

        if leaderboard.is_none() && snapshot.is_none() {
            return;
        }
        self.view_tx.send_modify(|view| {
            if let Some(board) = leaderboard {
                apply_leaderboard(view, board);
            }
            if snapshot.is_some() {
                view.snapshot = snapshot;
            }
        });
    }

    /// Play until `GameOver`, one piece per round.
    ///
    /// Spectators stop placing but keep following the game. Losing the host connection
    /// ends the session with [`NetError::HostDisconnected`].
    pub async fn play(&mut self, player: &mut dyn PiecePlayer) -> Result<GameSummary, NetError> {
        let seed = self.wait_for_seed(self.config.start_timeout).await?;
        let mut sequencer = PieceSequencer::new(seed);
        let mut drawn: u32 = 0;
        let mut spectator = false;

        loop {
            self.absorb_broadcasts();

            let Some(msg) = self.router.take_any(&ROUND_KINDS, POLL_INTERVAL).await else {
                if !self.router.is_connected() {
                    self.log.warn(format_args!("lost connection to host"));
                    return Err(NetError::HostDisconnected);
                }
                continue;
            };

            match msg {
                Message::PrepareNextPiece { round } => {
                    self.log.debug(format_args!("round {}: get ready", round));
                }
                Message::NextPiece {
                    piece_id,
                    preview_piece_id,
                    round,
                } => {
                    let (Some(piece), Some(preview)) =
                        (PieceKind::from_id(piece_id), PieceKind::from_id(preview_piece_id))
                    else {
                        self.log.warn(format_args!(
                            "round {}: invalid piece ids {}/{}",
                            round, piece_id, preview_piece_id
                        ));
                        continue;
                    };

                    // Catch up on rounds we never saw, then check our own copy.
                    while drawn + 1 < round {
                        sequencer.next();
                        drawn += 1;
                    }
                    if drawn < round {
                        let local = sequencer.next();
                        drawn += 1;
                        if local != piece {
                            self.log.warn(format_args!(
                                "round {}: sequence drift, local {} host {}; using host piece",
                                round,
                                local.as_str(),
                                piece.as_str()
                            ));
                        }
                    }

                    self.view_tx.send_modify(|view| {
                        view.round = round;
                        view.current_piece = Some(piece);
                        view.preview_piece = Some(preview);
                    });

                    if spectator {
                        continue;
                    }
                    let placement = player.play(round, piece, preview);
                    self.log.round(format_args!(
                        "round {}: placed {} for {}",
                        round,
                        piece.as_str(),
                        placement.score_delta
                    ));
                    self.send_placement(round, piece, &placement)?;
                }
                Message::RoundResults(results) => {
                    if results.spectators.contains(&self.player_id) {
                        spectator = true;
                    }
                    self.log.round(format_args!(
                        "round {}: score {} hp {}",
                        results.round,
                        results.new_scores.get(&self.player_id).copied().unwrap_or(0),
                        results.hp.get(&self.player_id).copied().unwrap_or(0)
                    ));
                    self.view_tx.send_modify(|view| {
                        view.scores = results.new_scores.clone();
                        view.hp = results.hp.clone();
                        view.spectators = results.spectators.clone();
                        view.is_spectator = spectator;
                        view.last_results = Some(results);
                    });
                }
                Message::PlayerEliminated { player_id, reason } => {
                    if player_id == self.player_id {
                        spectator = true;
                        self.log
                            .info(format_args!("eliminated ({}), now spectating", reason));
                        self.view_tx.send_modify(|view| view.is_spectator = true);
                    } else {
                        self.log
                            .info(format_args!("{} eliminated ({})", player_id, reason));
                    }
                }
                Message::WaitForNextRound { round, message } => {
                    self.log.debug(format_args!("round {}: {}", round, message));
                }
                Message::RoundReadyRequest { round } => {
                    if !spectator {
                        self.confirm_ready(round)?;
                    }
                }
                Message::GameOver { winner_id, stats } => {
                    let summary = GameSummary {
                        winner_id,
                        rounds_played: drawn,
                        stats,
                    };
                    self.log.info(format_args!(
                        "game over, winner: {}",
                        summary.winner_id.as_deref().unwrap_or("none")
                    ));
                    self.view_tx
                        .send_modify(|view| view.game_over = Some(summary.clone()));
                    return Ok(summary);
                }
                other => {
                    self.log
                        .debug(format_args!("ignoring {:?}", other.kind()));
                }
            }
        }
    }
}

fn apply_leaderboard(view: &mut ClientView, board: LeaderboardUpdate) {
    if board.round > view.round {
        view.round = board.round;
    }
    view.scores = board.scores;
    view.hp = board.hp;
    view.is_spectator = view.is_spectator || board.spectators.contains(&view.player_id);
    view.spectators = board.spectators;
    view.player_names = board.player_names;
    view.players_placed = board.players_placed;
}

impl Drop for GameClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}
