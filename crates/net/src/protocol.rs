//! Protocol module - the closed set of messages exchanged between host and clients
//!
//! Every frame body is a JSON object with a `type` discriminator. Decoding produces one
//! [`Message`] variant; consumers match on it exhaustively. Unknown fields are ignored so
//! older and newer peers can talk, while an unknown `type` is a decode error that the
//! receive loops log and skip.
//!
//! Field names are camelCase on the wire:
//!
//! ```text
//! {"type":"NextPiece","pieceId":2,"previewPieceId":5,"round":1}
//! {"type":"PlacedPiece","playerId":"player-1","pieceId":2,"placedAt":1700000000000,"locks":true,"scoreDelta":100,"linesCleared":1}
//! ```

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::core::Placement;
use crate::types::PieceKind;

/// Host-generated player identifier (`"player-N"`, or `"host"` for the host's own seat)
pub type PlayerId = String;

/// Row-major board grid: 0 = empty, `piece_id + 1` = filled
pub type BoardGrid = Vec<Vec<u8>>;

/// Client report of where its round piece went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedPiece {
    pub player_id: PlayerId,
    pub piece_id: u8,
    /// Epoch milliseconds at the client when the piece locked
    pub placed_at: u64,
    pub locks: bool,
    pub score_delta: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines_cleared: Option<u32>,
    /// Round the placement belongs to; absent from older clients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    /// Board after the placement, used only for spectator snapshots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<BoardGrid>,
}

impl PlacedPiece {
    pub fn from_placement(
        player_id: &str,
        round: u32,
        piece: PieceKind,
        placement: &Placement,
    ) -> Self {
        Self {
            player_id: player_id.to_string(),
            piece_id: piece.id(),
            placed_at: current_timestamp_ms(),
            locks: placement.locks,
            score_delta: placement.score_delta,
            lines_cleared: Some(placement.lines_cleared),
            round: Some(round),
            board: placement.board.clone(),
        }
    }
}

/// Consolidated outcome of one round.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResults {
    #[serde(default)]
    pub round: u32,
    pub new_scores: BTreeMap<PlayerId, u32>,
    pub hp: BTreeMap<PlayerId, u32>,
    pub hp_changes: BTreeMap<PlayerId, i32>,
    pub spectators: Vec<PlayerId>,
    pub deleted_rows_per_player: BTreeMap<PlayerId, u32>,
}

/// Full standings pushed on a fixed cadence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardUpdate {
    #[serde(default)]
    pub round: u32,
    pub scores: BTreeMap<PlayerId, u32>,
    pub hp: BTreeMap<PlayerId, u32>,
    pub spectators: Vec<PlayerId>,
    pub player_names: BTreeMap<PlayerId, String>,
    pub players_placed: Vec<PlayerId>,
}

/// Boards of every active player, for eliminated players to watch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectatorSnapshot {
    pub boards: BTreeMap<PlayerId, BoardGrid>,
    pub scores: BTreeMap<PlayerId, u32>,
    pub hp: BTreeMap<PlayerId, u32>,
    pub spectators: Vec<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    #[serde(default)]
    pub name: String,
    pub score: u32,
    pub hp: u32,
    pub is_spectator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPlayer {
    pub id: PlayerId,
    pub name: String,
    pub hp: u32,
    pub is_spectator: bool,
}

/// Every message in the protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename_all = "camelCase")]
    ConnectRequest { player_name: String },
    #[serde(rename_all = "camelCase")]
    ConnectResponse {
        player_id: PlayerId,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default)]
        rejoined: bool,
    },
    StartGame { seed: u32 },
    PrepareNextPiece { round: u32 },
    #[serde(rename_all = "camelCase")]
    NextPiece {
        piece_id: u8,
        preview_piece_id: u8,
        round: u32,
    },
    PlacedPiece(PlacedPiece),
    RoundResults(RoundResults),
    WaitForNextRound { round: u32, message: String },
    RoundReadyRequest { round: u32 },
    RoundReadyConfirmation { round: u32 },
    LeaderboardUpdate(LeaderboardUpdate),
    SpectatorSnapshot(SpectatorSnapshot),
    #[serde(rename_all = "camelCase")]
    PlayerEliminated { player_id: PlayerId, reason: String },
    #[serde(rename_all = "camelCase")]
    GameOver {
        winner_id: Option<PlayerId>,
        stats: BTreeMap<PlayerId, PlayerStats>,
    },
    LobbyUpdate { players: Vec<LobbyPlayer> },
}

/// Payload-free discriminant of [`Message`], used to dequeue by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    ConnectRequest,
    ConnectResponse,
    StartGame,
    PrepareNextPiece,
    NextPiece,
    PlacedPiece,
    RoundResults,
    WaitForNextRound,
    RoundReadyRequest,
    RoundReadyConfirmation,
    LeaderboardUpdate,
    SpectatorSnapshot,
    PlayerEliminated,
    GameOver,
    LobbyUpdate,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::ConnectRequest { .. } => MessageKind::ConnectRequest,
            Message::ConnectResponse { .. } => MessageKind::ConnectResponse,
            Message::StartGame { .. } => MessageKind::StartGame,
            Message::PrepareNextPiece { .. } => MessageKind::PrepareNextPiece,
            Message::NextPiece { .. } => MessageKind::NextPiece,
            Message::PlacedPiece(_) => MessageKind::PlacedPiece,
            Message::RoundResults(_) => MessageKind::RoundResults,
            Message::WaitForNextRound { .. } => MessageKind::WaitForNextRound,
            Message::RoundReadyRequest { .. } => MessageKind::RoundReadyRequest,
            Message::RoundReadyConfirmation { .. } => MessageKind::RoundReadyConfirmation,
            Message::LeaderboardUpdate(_) => MessageKind::LeaderboardUpdate,
            Message::SpectatorSnapshot(_) => MessageKind::SpectatorSnapshot,
            Message::PlayerEliminated { .. } => MessageKind::PlayerEliminated,
            Message::GameOver { .. } => MessageKind::GameOver,
            Message::LobbyUpdate { .. } => MessageKind::LobbyUpdate,
        }
    }

    /// Messages a client is allowed to send once it has joined.
    pub fn is_client_message(&self) -> bool {
        matches!(
            self,
            Message::PlacedPiece(_) | Message::RoundReadyConfirmation { .. }
        )
    }
}

/// Final standings as seen by either side once `GameOver` is known.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameSummary {
    pub winner_id: Option<PlayerId>,
    pub rounds_played: u32,
    pub stats: BTreeMap<PlayerId, PlayerStats>,
}

/// Create a connect request
pub fn create_connect_request(player_name: &str) -> Message {
    Message::ConnectRequest {
        player_name: player_name.to_string(),
    }
}

/// Create a connect response (accepted when `error` is None)
pub fn create_connect_response(player_id: &str, error: Option<String>, rejoined: bool) -> Message {
    Message::ConnectResponse {
        player_id: player_id.to_string(),
        success: error.is_none(),
        error,
        rejoined,
    }
}

/// Get current timestamp in milliseconds
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
