use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tetris_battle::core::{AutoPlayer, Board, PiecePlayer, PieceSequencer};
use tetris_battle::net::host::{settle_round, EliminationPolicy, PlayerRecord};
use tetris_battle::net::protocol::PlacedPiece;
use tetris_battle::types::PieceKind;

fn bench_sequencer(c: &mut Criterion) {
    c.bench_function("sequencer_next_10k", |b| {
        b.iter(|| {
            let mut seq = PieceSequencer::new(black_box(12345));
            for _ in 0..10_000 {
                black_box(seq.next());
                black_box(seq.peek(0));
            }
        })
    });
}

fn bench_line_clear(c: &mut Criterion) {
    c.bench_function("clear_4_lines", |b| {
        b.iter(|| {
            let mut board = Board::new();
            // Fill bottom 4 rows
            for y in 16..20 {
                for x in 0..10 {
                    board.set(x, y, Some(PieceKind::I));
                }
            }
            board.clear_full_rows();
        })
    });
}

fn bench_auto_player(c: &mut Criterion) {
    let mut seq = PieceSequencer::new(12345);
    let mut player = AutoPlayer::new();
    let mut round = 0;

    c.bench_function("auto_player_round", |b| {
        b.iter(|| {
            round += 1;
            let piece = seq.next();
            let preview = seq.peek(0);
            black_box(player.play(round, piece, preview));
        })
    });
}

fn bench_settle(c: &mut Criterion) {
    let policy = EliminationPolicy::default();
    let placements: BTreeMap<String, PlacedPiece> = (0..8)
        .map(|i| {
            let id = format!("player-{}", i);
            let placed = PlacedPiece {
                player_id: id.clone(),
                piece_id: 0,
                placed_at: 0,
                locks: true,
                score_delta: 100 * i,
                lines_cleared: None,
                round: Some(1),
                board: None,
            };
            (id, placed)
        })
        .collect();

    c.bench_function("settle_8_players", |b| {
        b.iter(|| {
            let mut players: BTreeMap<String, PlayerRecord> = placements
                .keys()
                .map(|id| (id.clone(), PlayerRecord::new(id, id, 10)))
                .collect();
            black_box(settle_round(&mut players, &placements, &policy, 1));
        })
    });
}

criterion_group!(
    benches,
    bench_sequencer,
    bench_line_clear,
    bench_auto_player,
    bench_settle,
);
criterion_main!(benches);
