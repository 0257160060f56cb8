//! Game table - the host's record of every player and the current round
//!
//! Written only by the round coordinator; the broadcasters take read locks to build their
//! periodic messages.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::protocol::{
    BoardGrid, LeaderboardUpdate, LobbyPlayer, Message, PlayerId, PlayerStats, SpectatorSnapshot,
};

/// One seat at the table. Persists for the whole game, eliminated or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub hp: u32,
    pub is_spectator: bool,
    pub missed_rounds: u32,
    pub lines_cleared: u32,
}

impl PlayerRecord {
    pub fn new(id: &str, name: &str, hp: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            score: 0,
            hp,
            is_spectator: false,
            missed_rounds: 0,
            lines_cleared: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.is_spectator
    }
}

#[derive(Debug, Default)]
pub struct GameTable {
    pub players: BTreeMap<PlayerId, PlayerRecord>,
    /// Players whose placement for the current round has been accepted
    pub placed: BTreeSet<PlayerId>,
    /// Last board each player reported
    pub boards: BTreeMap<PlayerId, BoardGrid>,
    pub round: u32,
    pub started: bool,
}

pub type SharedTable = Arc<RwLock<GameTable>>;

impl GameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedTable {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Seat a player if not already seated. Returns true when a new record was created.
    pub fn seat(&mut self, id: &str, name: &str, hp: u32) -> bool {
        if self.players.contains_key(id) {
            return false;
        }
        self.players
            .insert(id.to_string(), PlayerRecord::new(id, name, hp));
        true
    }

    pub fn unseat(&mut self, id: &str) {
        self.players.remove(id);
        self.boards.remove(id);
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.players.get(id).map(|p| p.is_active()).unwrap_or(false)
    }

    pub fn active_ids(&self) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|p| p.is_active())
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn spectators(&self) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|p| p.is_spectator)
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn scores(&self) -> BTreeMap<PlayerId, u32> {
        self.players
            .values()
            .map(|p| (p.id.clone(), p.score))
            .collect()
    }

    pub fn hp(&self) -> BTreeMap<PlayerId, u32> {
        self.players.values().map(|p| (p.id.clone(), p.hp)).collect()
    }

    pub fn begin_round(&mut self, round: u32) {
        self.round = round;
        self.placed.clear();
    }

    pub fn leaderboard(&self) -> LeaderboardUpdate {
        LeaderboardUpdate {
            round: self.round,
            scores: self.scores(),
            hp: self.hp(),
            spectators: self.spectators(),
            player_names: self
                .players
                .values()
                .map(|p| (p.id.clone(), p.name.clone()))
                .collect(),
            players_placed: self.placed.iter().cloned().collect(),
        }
    }

    /// Boards of active players only
    pub fn snapshot(&self) -> SpectatorSnapshot {
        SpectatorSnapshot {
            boards: self
                .boards
                .iter()
                .filter(|(id, _)| self.is_active(id))
                .map(|(id, grid)| (id.clone(), grid.clone()))
                .collect(),
            scores: self.scores(),
            hp: self.hp(),
            spectators: self.spectators(),
        }
    }

    pub fn lobby(&self) -> Message {
        Message::LobbyUpdate {
            players: self
                .players
                .values()
                .map(|p| LobbyPlayer {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    hp: p.hp,
                    is_spectator: p.is_spectator,
                })
                .collect(),
        }
    }

    pub fn final_stats(&self) -> BTreeMap<PlayerId, PlayerStats> {
        self.players
            .values()
            .map(|p| {
                (
                    p.id.clone(),
                    PlayerStats {
                        name: p.name.clone(),
                        score: p.score,
                        hp: p.hp,
                        is_spectator: p.is_spectator,
                    },
                )
            })
            .collect()
    }

    /// True once at most one player is still active
    pub fn is_decided(&self) -> bool {
        self.players.values().filter(|p| p.is_active()).count() <= 1
    }

    /// The sole active player; with nobody active, the unique top scorer.
    pub fn winner(&self) -> Option<PlayerId> {
        let mut active = self.players.values().filter(|p| p.is_active());
        match (active.next(), active.next()) {
            (Some(only), None) => return Some(only.id.clone()),
            (Some(_), Some(_)) => return None,
            _ => {}
        }

        let best = self.players.values().map(|p| p.score).max()?;
        let mut leaders = self.players.values().filter(|p| p.score == best);
        match (leaders.next(), leaders.next()) {
            (Some(leader), None) => Some(leader.id.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(players: &[(&str, u32, bool)]) -> GameTable {
        let mut table = GameTable::new();
        for &(id, score, spectator) in players {
            table.seat(id, id, 10);
            let p = table.players.get_mut(id).unwrap();
            p.score = score;
            p.is_spectator = spectator;
            if spectator {
                p.hp = 0;
            }
        }
        table
    }

    #[test]
    fn test_sole_survivor_wins() {
        let table = table_with(&[("a", 0, true), ("b", 100, false), ("c", 900, true)]);
        assert!(table.is_decided());
        assert_eq!(table.winner(), Some("b".to_string()));
    }

    #[test]
    fn test_no_survivor_falls_back_to_top_score() {
        let table = table_with(&[("a", 300, true), ("b", 100, true)]);
        assert_eq!(table.winner(), Some("a".to_string()));

        let tied = table_with(&[("a", 300, true), ("b", 300, true)]);
        assert_eq!(tied.winner(), None);
    }

    #[test]
    fn test_undecided_game_has_no_winner() {
        let table = table_with(&[("a", 0, false), ("b", 0, false)]);
        assert!(!table.is_decided());
        assert_eq!(table.winner(), None);
    }

    #[test]
    fn test_snapshot_excludes_spectator_boards() {
        let mut table = table_with(&[("a", 0, false), ("b", 0, true)]);
        table.boards.insert("a".into(), vec![vec![0; 10]; 20]);
        table.boards.insert("b".into(), vec![vec![1; 10]; 20]);
        let snap = table.snapshot();
        assert_eq!(snap.boards.len(), 1);
        assert!(snap.boards.contains_key("a"));
        assert_eq!(snap.spectators, vec!["b".to_string()]);
    }

    #[test]
    fn test_leaderboard_lists_placed_players() {
        let mut table = table_with(&[("a", 10, false), ("b", 20, false)]);
        table.begin_round(4);
        table.placed.insert("b".into());
        let board = table.leaderboard();
        assert_eq!(board.round, 4);
        assert_eq!(board.players_placed, vec!["b".to_string()]);
        assert_eq!(board.player_names.get("a").map(String::as_str), Some("a"));
    }
}
