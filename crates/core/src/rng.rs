//! RNG module - deterministic shared-seed piece sequencing
//!
//! Every participant in a battle builds a [`PieceSequencer`] from the same seed and therefore
//! sees the same pieces in the same order. The sequence is generated with the "7-bag"
//! algorithm: each bag holds one of each piece (I, O, T, S, Z, J, L), shuffled, and bags are
//! appended back to back.
//!
//! The RNG is a plain LCG so that the sequence is stable across platforms and Rust versions.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::PieceKind;

/// Pieces materialized when a sequencer is created (100 bags).
pub const INITIAL_BATCH: usize = 700;

/// When a read comes this close to the end of storage, another batch is appended.
pub const REFILL_MARGIN: usize = 14;

/// Simple LCG (Linear Congruential Generator) RNG
/// Uses constants from Numerical Recipes
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u32,
}

impl SimpleRng {
    /// Create a new RNG with the given seed
    ///
    /// Seed 0 is an alias for seed 1: both produce the same stream.
    pub fn new(seed: u32) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generate next random u32
    pub fn next_u32(&mut self) -> u32 {
        // LCG formula: (a * state + c) mod m
        // Using Numerical Recipes constants: a=1664525, c=1013904223, m=2^32
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        self.state
    }

    /// Generate random value in range [0, max)
    pub fn next_range(&mut self, max: u32) -> u32 {
        self.next_u32() % max
    }

    /// Shuffle a slice using Fisher-Yates
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.next_range((i + 1) as u32) as usize;
            slice.swap(i, j);
        }
    }
}

/// Derive a seed from the wall clock (used by the host when no seed is configured).
pub fn seed_from_clock() -> u32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(1);
    // Fold the high bits in so seeds differ even on coarse clocks.
    (nanos as u64 ^ (nanos >> 64) as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) as u32 | 1
}

/// Deterministic, append-only piece sequence
///
/// `PieceSequencer::new(s)` yields the same pieces as any other sequencer built with `s`,
/// for every index. Storage grows transparently, so callers never run out of pieces.
#[derive(Debug, Clone)]
pub struct PieceSequencer {
    seed: u32,
    rng: SimpleRng,
    pieces: Vec<PieceKind>,
    cursor: usize,
}

impl PieceSequencer {
    /// Create a sequencer and materialize the first batch.
    ///
    /// Seeds 0 and 1 deal the same pieces (see [`SimpleRng::new`]); `seed()` still
    /// reports the value given here.
    pub fn new(seed: u32) -> Self {
        let mut sequencer = Self {
            seed,
            rng: SimpleRng::new(seed),
            pieces: Vec::with_capacity(INITIAL_BATCH),
            cursor: 0,
        };
        sequencer.extend_batch();
        sequencer
    }

    /// Append one batch of shuffled bags.
    fn extend_batch(&mut self) {
        let bags = INITIAL_BATCH / PieceKind::ALL.len();
        self.pieces.reserve(INITIAL_BATCH);
        for _ in 0..bags {
            let mut bag = PieceKind::ALL;
            self.rng.shuffle(&mut bag);
            self.pieces.extend_from_slice(&bag);
        }
    }

    fn ensure_available(&mut self, index: usize) {
        while index + REFILL_MARGIN >= self.pieces.len() {
            self.extend_batch();
        }
    }

    /// Return the current piece and advance the cursor.
    pub fn next(&mut self) -> PieceKind {
        self.ensure_available(self.cursor);
        let piece = self.pieces[self.cursor];
        self.cursor += 1;
        piece
    }

    /// Look `k` pieces ahead without advancing (`peek(0)` is what `next()` returns).
    pub fn peek(&mut self, k: usize) -> PieceKind {
        let index = self.cursor + k;
        self.ensure_available(index);
        self.pieces[index]
    }

    /// Rewind to the first piece. The seed and generated pieces are kept.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Number of pieces handed out by `next()` since creation or the last reset.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[cfg(test)]
    fn materialized(&self) -> usize {
        self.pieces.len()
    }
}
