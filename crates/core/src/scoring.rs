//! Scoring module - battle-mode line clear scores
//!
//! A round's score delta is derived purely from how many lines the round's piece cleared.
//! The host never re-simulates a remote board; when a placement report omits its line count,
//! the count is recovered from the delta with [`lines_for_score`].

use crate::types::LINE_SCORES;

/// Points for clearing `lines` lines with one piece (0 for anything outside 1..=4)
pub fn line_clear_score(lines: u32) -> u32 {
    LINE_SCORES.get(lines as usize).copied().unwrap_or(0)
}

/// Lines implied by a score delta; deltas not in the table map to 0 lines
pub fn lines_for_score(score_delta: i64) -> u32 {
    LINE_SCORES
        .iter()
        .position(|&points| points != 0 && i64::from(points) == score_delta)
        .map(|lines| lines as u32)
        .unwrap_or(0)
}

/// Clamp a client-reported delta to the non-negative range the host accepts
pub fn accepted_delta(score_delta: i64) -> u32 {
    score_delta.clamp(0, i64::from(u32::MAX)) as u32
}
