//! Round settlement: scores, misses, the minimum-score HP penalty and eliminations.
//!
//! Pure over the player map so every rule can be checked without a socket.

use std::collections::BTreeMap;

use crate::core::{accepted_delta, lines_for_score};
use crate::host::elimination::{EliminationPolicy, Verdict};
use crate::host::table::PlayerRecord;
use crate::protocol::{PlacedPiece, PlayerId, RoundResults};
use crate::types::LINE_SCORES;

pub const REASON_MISSED_ROUNDS: &str = "missed too many rounds";
pub const REASON_HP_DEPLETED: &str = "hp depleted";

const MAX_LINES_PER_PIECE: u32 = (LINE_SCORES.len() - 1) as u32;

/// Results plus the players eliminated this round, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    pub results: RoundResults,
    pub eliminated: Vec<(PlayerId, &'static str)>,
}

pub fn settle_round(
    players: &mut BTreeMap<PlayerId, PlayerRecord>,
    placements: &BTreeMap<PlayerId, PlacedPiece>,
    policy: &EliminationPolicy,
    round: u32,
) -> RoundOutcome {
    let mut hp_changes: BTreeMap<PlayerId, i32> = BTreeMap::new();
    let mut deleted_rows: BTreeMap<PlayerId, u32> = BTreeMap::new();
    let mut eliminated = Vec::new();

    for player in players.values_mut().filter(|p| p.is_active()) {
        hp_changes.insert(player.id.clone(), 0);

        let placement = placements.get(&player.id);
        if let Some(placed) = placement {
            player.score = player.score.saturating_add(accepted_delta(placed.score_delta));
            // One piece clears at most four rows, whatever the client claims.
            let lines = placed
                .lines_cleared
                .unwrap_or_else(|| lines_for_score(placed.score_delta))
                .min(MAX_LINES_PER_PIECE);
            player.lines_cleared = player.lines_cleared.saturating_add(lines);
            deleted_rows.insert(player.id.clone(), lines);
        } else {
            deleted_rows.insert(player.id.clone(), 0);
        }

        let hp_before = player.hp;
        if policy.record_round(player, placement.is_some()) == Verdict::Eliminated {
            hp_changes.insert(player.id.clone(), -(hp_before as i32));
            eliminated.push((player.id.clone(), REASON_MISSED_ROUNDS));
        }
    }

    // Unique lowest score among survivors loses one HP.
    let active: Vec<&PlayerRecord> = players.values().filter(|p| p.is_active()).collect();
    let penalized = if active.len() >= 2 {
        let lowest = active.iter().map(|p| p.score).min();
        let holders: Vec<&&PlayerRecord> =
            active.iter().filter(|p| Some(p.score) == lowest).collect();
        match holders.as_slice() {
            [only] => Some(only.id.clone()),
            _ => None,
        }
    } else {
        None
    };

    if let Some(id) = penalized {
        if let Some(player) = players.get_mut(&id) {
            player.hp = player.hp.saturating_sub(1);
            *hp_changes.entry(id.clone()).or_insert(0) -= 1;
            if player.hp == 0 {
                player.is_spectator = true;
                eliminated.push((id, REASON_HP_DEPLETED));
            }
        }
    }

    let results = RoundResults {
        round,
        new_scores: players
            .values()
            .map(|p| (p.id.clone(), p.score))
            .collect(),
        hp: players.values().map(|p| (p.id.clone(), p.hp)).collect(),
        hp_changes,
        spectators: players
            .values()
            .filter(|p| p.is_spectator)
            .map(|p| p.id.clone())
            .collect(),
        deleted_rows_per_player: deleted_rows,
    };

    RoundOutcome {
        results,
        eliminated,
    }
}
