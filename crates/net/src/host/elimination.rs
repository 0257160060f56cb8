//! Elimination policy - consecutive missed rounds turn a player into a spectator.

use crate::host::table::PlayerRecord;
use crate::types::MISSED_ROUND_LIMIT;

/// What one round did to a player's standing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Placed this round; miss counter reset
    Active,
    /// Missed this round; carries the running count
    Missed(u32),
    /// Reached the miss limit this round
    Eliminated,
}

#[derive(Debug, Clone, Copy)]
pub struct EliminationPolicy {
    limit: u32,
}

impl Default for EliminationPolicy {
    fn default() -> Self {
        Self {
            limit: MISSED_ROUND_LIMIT,
        }
    }
}

impl EliminationPolicy {
    /// Apply one round's outcome to an active player.
    pub fn record_round(&self, player: &mut PlayerRecord, placed: bool) -> Verdict {
        if player.is_spectator {
            return Verdict::Active;
        }
        if placed {
            player.missed_rounds = 0;
            return Verdict::Active;
        }

        player.missed_rounds += 1;
        if player.missed_rounds >= self.limit {
            player.hp = 0;
            player.is_spectator = true;
            Verdict::Eliminated
        } else {
            Verdict::Missed(player.missed_rounds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_third_consecutive_miss_eliminates() {
        let policy = EliminationPolicy::default();
        let mut p = PlayerRecord::new("player-1", "alice", 10);
        assert_eq!(policy.record_round(&mut p, false), Verdict::Missed(1));
        assert_eq!(policy.record_round(&mut p, false), Verdict::Missed(2));
        assert!(!p.is_spectator);
        assert_eq!(policy.record_round(&mut p, false), Verdict::Eliminated);
        assert!(p.is_spectator);
        assert_eq!(p.hp, 0);
    }

    #[test]
    fn test_arrival_resets_counter() {
        let policy = EliminationPolicy::default();
        let mut p = PlayerRecord::new("player-1", "alice", 10);
        policy.record_round(&mut p, false);
        policy.record_round(&mut p, false);
        assert_eq!(policy.record_round(&mut p, true), Verdict::Active);
        assert_eq!(p.missed_rounds, 0);
        assert_eq!(policy.record_round(&mut p, false), Verdict::Missed(1));
        assert_eq!(p.hp, 10);
    }
}
