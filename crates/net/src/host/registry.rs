//! Connection registry - live client connections keyed by player id
//!
//! Entries are never removed once a game has started: a dead entry keeps its id and name so
//! the same player can reconnect and take the seat back. Each attachment gets a fresh
//! generation number, so a reader task left over from an old socket cannot mark the new
//! one as lost.
//!
//! Outbound queues are bounded. A peer that lets its queue fill up is flagged as stalled,
//! gets no further frames, and is dropped by [`ConnectionRegistry::drop_stalled`].

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;

use crate::error::NetError;
use crate::framing::{encode_message, FrameBytes};
use crate::protocol::{Message, PlayerId};

/// Handle to a connected (or formerly connected) client
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: PlayerId,
    pub name: String,
    pub addr: SocketAddr,
    pub alive: bool,
    generation: u64,
    stalled: AtomicBool,
    tx: mpsc::Sender<FrameBytes>,
}

impl ConnectionHandle {
    /// Queue a frame without waiting. A full queue marks the peer stalled.
    fn offer(&self, bytes: &FrameBytes) -> bool {
        if !self.alive || self.stalled.load(Ordering::Relaxed) {
            return false;
        }
        match self.tx.try_send(Arc::clone(bytes)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.stalled.store(true, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Relaxed)
    }
}

/// Outcome of a connect handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Joined { player_id: PlayerId },
    Rejoined { player_id: PlayerId },
    Rejected { reason: String },
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: BTreeMap<PlayerId, ConnectionHandle>,
    next_player: u32,
    next_generation: u64,
    game_started: bool,
}

pub type SharedRegistry = Arc<RwLock<ConnectionRegistry>>;

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Attach a connection under `name`.
    ///
    /// Returns the registration and the generation of this attachment.
    pub fn register(
        &mut self,
        name: &str,
        addr: SocketAddr,
        tx: mpsc::Sender<FrameBytes>,
    ) -> (Registration, u64) {
        let name = name.trim();
        if name.is_empty() {
            return (
                Registration::Rejected {
                    reason: "player name must not be empty".to_string(),
                },
                0,
            );
        }

        self.next_generation += 1;
        let generation = self.next_generation;

        if let Some(existing) = self.connections.values_mut().find(|c| c.name == name) {
            if existing.alive {
                return (
                    Registration::Rejected {
                        reason: format!("name '{}' is already in use", name),
                    },
                    0,
                );
            }
            existing.alive = true;
            existing.addr = addr;
            existing.generation = generation;
            existing.stalled = AtomicBool::new(false);
            existing.tx = tx;
            return (
                Registration::Rejoined {
                    player_id: existing.id.clone(),
                },
                generation,
            );
        }

        if self.game_started {
            return (
                Registration::Rejected {
                    reason: "game already in progress".to_string(),
                },
                0,
            );
        }

        self.next_player += 1;
        let id = format!("player-{}", self.next_player);
        self.connections.insert(
            id.clone(),
            ConnectionHandle {
                id: id.clone(),
                name: name.to_string(),
                addr,
                alive: true,
                generation,
                stalled: AtomicBool::new(false),
                tx,
            },
        );
        (Registration::Joined { player_id: id }, generation)
    }

    /// Mark a connection dead and release its writer.
    ///
    /// Ignored when `generation` is not the current attachment.
    pub fn mark_lost(&mut self, id: &str, generation: u64) -> bool {
        match self.connections.get_mut(id) {
            Some(conn) if conn.generation == generation && conn.alive => {
                conn.alive = false;
                conn.tx = closed_sender();
                true
            }
            _ => false,
        }
    }

    /// Disconnect every stalled peer; returns their ids.
    ///
    /// Their writers flush what is queued and then close the socket.
    pub fn drop_stalled(&mut self) -> Vec<PlayerId> {
        let mut dropped = Vec::new();
        for conn in self.connections.values_mut() {
            if conn.alive && conn.is_stalled() {
                conn.alive = false;
                conn.tx = closed_sender();
                dropped.push(conn.id.clone());
            }
        }
        dropped
    }

    /// Drop an entry entirely (players that left before the game started)
    pub fn forget(&mut self, id: &str) {
        self.connections.remove(id);
    }

    pub fn set_game_started(&mut self) {
        self.game_started = true;
    }

    pub fn game_started(&self) -> bool {
        self.game_started
    }

    pub fn is_alive(&self, id: &str) -> bool {
        self.connections.get(id).map(|c| c.alive).unwrap_or(false)
    }

    pub fn alive_count(&self) -> usize {
        self.connections.values().filter(|c| c.alive).count()
    }

    pub fn dead_ids(&self) -> Vec<PlayerId> {
        self.connections
            .values()
            .filter(|c| !c.alive)
            .map(|c| c.id.clone())
            .collect()
    }

    /// Queue an already-encoded frame for one player.
    pub fn send_bytes_to(&self, id: &str, bytes: &FrameBytes) -> bool {
        self.connections
            .get(id)
            .map(|conn| conn.offer(bytes))
            .unwrap_or(false)
    }

    pub fn send_to(&self, id: &str, msg: &Message) -> Result<bool, NetError> {
        let bytes = encode_message(msg)?;
        Ok(self.send_bytes_to(id, &bytes))
    }

    /// Queue an already-encoded frame on every live connection.
    pub fn broadcast_bytes(&self, bytes: &FrameBytes) -> usize {
        self.connections
            .values()
            .filter(|c| c.offer(bytes))
            .count()
    }

    /// Encode once and fan out. Returns the number of connections it was queued on.
    pub fn broadcast(&self, msg: &Message) -> Result<usize, NetError> {
        let bytes = encode_message(msg)?;
        Ok(self.broadcast_bytes(&bytes))
    }

    /// Drop every outbound sender so writer tasks flush and close their sockets.
    pub fn close_all(&mut self) {
        for conn in self.connections.values_mut() {
            conn.alive = false;
            conn.tx = closed_sender();
        }
    }
}

fn closed_sender() -> mpsc::Sender<FrameBytes> {
    let (tx, _) = mpsc::channel(1);
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{decode_message, outbound_channel, OUTBOUND_QUEUE_FRAMES};

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn test_ids_are_generated_in_order() {
        let mut reg = ConnectionRegistry::new();
        let (tx, _rx) = outbound_channel();
        let (a, _) = reg.register("alice", addr(), tx.clone());
        let (b, _) = reg.register("bob", addr(), tx);
        assert_eq!(
            a,
            Registration::Joined {
                player_id: "player-1".to_string()
            }
        );
        assert_eq!(
            b,
            Registration::Joined {
                player_id: "player-2".to_string()
            }
        );
        assert_eq!(reg.alive_count(), 2);
    }

    #[test]
    fn test_duplicate_live_name_is_rejected() {
        let mut reg = ConnectionRegistry::new();
        let (tx, _rx) = outbound_channel();
        reg.register("alice", addr(), tx.clone());
        let (second, _) = reg.register("alice", addr(), tx);
        assert!(matches!(second, Registration::Rejected { .. }));
        assert_eq!(reg.alive_count(), 1);
    }

    #[test]
    fn test_rejoin_reuses_id() {
        let mut reg = ConnectionRegistry::new();
        let (tx, _rx) = outbound_channel();
        let (_, gen1) = reg.register("alice", addr(), tx.clone());
        reg.set_game_started();
        assert!(reg.mark_lost("player-1", gen1));
        assert_eq!(reg.dead_ids(), vec!["player-1".to_string()]);

        let (again, gen2) = reg.register("alice", addr(), tx);
        assert_eq!(
            again,
            Registration::Rejoined {
                player_id: "player-1".to_string()
            }
        );
        assert!(gen2 > gen1);

        // The old reader cannot kill the new attachment.
        assert!(!reg.mark_lost("player-1", gen1));
        assert!(reg.is_alive("player-1"));
    }

    #[test]
    fn test_new_names_rejected_after_start() {
        let mut reg = ConnectionRegistry::new();
        let (tx, _rx) = outbound_channel();
        reg.set_game_started();
        let (late, _) = reg.register("carol", addr(), tx);
        assert!(matches!(late, Registration::Rejected { .. }));
    }

    #[test]
    fn test_broadcast_skips_dead_connections() {
        let mut reg = ConnectionRegistry::new();
        let (tx1, mut rx1) = outbound_channel();
        let (tx2, mut rx2) = outbound_channel();
        reg.register("alice", addr(), tx1);
        let (_, gen) = reg.register("bob", addr(), tx2);
        reg.mark_lost("player-2", gen);

        let sent = reg.broadcast(&Message::RoundReadyRequest { round: 2 }).unwrap();
        assert_eq!(sent, 1);
        let bytes = rx1.try_recv().unwrap();
        assert_eq!(
            decode_message(&bytes).unwrap(),
            Message::RoundReadyRequest { round: 2 }
        );
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_marks_peer_stalled_until_dropped() {
        let mut reg = ConnectionRegistry::new();
        let (slow_tx, _slow_rx) = outbound_channel();
        let (fast_tx, mut fast_rx) = outbound_channel();
        reg.register("slow", addr(), slow_tx);
        reg.register("fast", addr(), fast_tx);

        let msg = Message::RoundReadyRequest { round: 1 };
        for _ in 0..OUTBOUND_QUEUE_FRAMES {
            assert_eq!(reg.broadcast(&msg).unwrap(), 2);
            fast_rx.try_recv().unwrap();
        }

        // slow never reads: its queue is full now.
        assert_eq!(reg.broadcast(&msg).unwrap(), 1);
        assert!(reg.is_alive("player-1"));
        assert_eq!(reg.drop_stalled(), vec!["player-1".to_string()]);
        assert!(!reg.is_alive("player-1"));
        assert!(reg.is_alive("player-2"));
        assert!(reg.drop_stalled().is_empty());

        // Taking the seat back clears the flag.
        let (tx, mut rx) = outbound_channel();
        let (again, _) = reg.register("slow", addr(), tx);
        assert!(matches!(again, Registration::Rejoined { .. }));
        assert!(reg.send_to("player-1", &msg).unwrap());
        assert!(rx.try_recv().is_ok());
    }
}
