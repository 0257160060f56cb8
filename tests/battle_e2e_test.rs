mod common;

use std::time::Duration;

use tokio::time::timeout;

use common::{fast_config, join, spawn_play, start_host, FixedPlayer};
use tetris_battle::core::{AutoPlayer, PieceSequencer, Placement};
use tetris_battle::net::{Message, MessageKind, NetError};
use tetris_battle::types::PieceKind;

#[tokio::test]
async fn host_and_clients_share_seed_pieces_and_round_results() {
    let host = start_host(
        fast_config(2, 12345),
        Some(Box::new(FixedPlayer { delta: 100 })),
    )
    .await;
    let alice = join(host.addr, "alice").await;
    let bob = join(host.addr, "bob").await;
    assert_eq!(alice.player_id(), "player-1");
    assert_eq!(bob.player_id(), "player-2");

    let mut expected = PieceSequencer::new(12345);
    let first = expected.next();
    let preview = expected.peek(0);

    for client in [&alice, &bob] {
        let seed = client
            .wait_for_seed(Duration::from_secs(2))
            .await
            .expect("StartGame");
        assert_eq!(seed, 12345);

        let msg = client
            .take_timeout(MessageKind::NextPiece, Duration::from_secs(2))
            .await
            .expect("NextPiece");
        let Message::NextPiece {
            piece_id,
            preview_piece_id,
            round,
        } = msg
        else {
            panic!("Expected NextPiece, got {:?}", msg);
        };
        assert_eq!(round, 1);
        assert_eq!(piece_id, first.id());
        assert_eq!(preview_piece_id, preview.id());

        let placement = Placement {
            score_delta: 100,
            lines_cleared: 1,
            locks: true,
            board: None,
        };
        client
            .send_placement(round, PieceKind::from_id(piece_id).unwrap(), &placement)
            .unwrap();
    }

    for client in [&alice, &bob] {
        let msg = client
            .take_timeout(MessageKind::RoundResults, Duration::from_secs(2))
            .await
            .expect("RoundResults");
        let Message::RoundResults(results) = msg else {
            panic!("Expected RoundResults, got {:?}", msg);
        };
        assert_eq!(results.round, 1);
        assert_eq!(results.new_scores.len(), 3);
        assert_eq!(results.new_scores["host"], 100);
        assert_eq!(results.new_scores["player-1"], 100);
        assert_eq!(results.new_scores["player-2"], 100);
        // Three-way tie at the minimum: nobody loses HP.
        assert_eq!(results.hp_changes["host"], 0);
        assert!(results.hp_changes.values().all(|&d| d == 0));
        assert_eq!(results.hp["player-1"], 10);
        assert_eq!(results.deleted_rows_per_player["player-2"], 1);
        assert!(results.spectators.is_empty());

        let msg = client
            .take_timeout(MessageKind::RoundReadyRequest, Duration::from_secs(2))
            .await
            .expect("RoundReadyRequest");
        assert_eq!(msg, Message::RoundReadyRequest { round: 1 });
        client.confirm_ready(1).unwrap();
    }

    // Round 2 deals the piece that was previewed in round 1.
    let msg = alice
        .take_timeout(MessageKind::NextPiece, Duration::from_secs(2))
        .await
        .expect("second NextPiece");
    assert!(matches!(
        msg,
        Message::NextPiece { piece_id, round: 2, .. } if piece_id == preview.id()
    ));

    assert!(matches!(host.stop().await, Err(NetError::Cancelled)));
}

#[tokio::test]
async fn silent_player_becomes_spectator_on_third_miss() {
    let host = start_host(fast_config(3, 7), None).await;
    let alice = join(host.addr, "alice").await;
    let bob = join(host.addr, "bob").await;
    let carol = join(host.addr, "carol").await;
    let carol_id = carol.player_id().to_string();

    let alice_task = spawn_play(alice, 100);
    let bob_task = spawn_play(bob, 100);

    for (round, hp) in [(1, 9), (2, 8)] {
        let msg = carol
            .take_timeout(MessageKind::RoundResults, Duration::from_secs(5))
            .await
            .expect("RoundResults");
        let Message::RoundResults(results) = msg else {
            panic!("Expected RoundResults, got {:?}", msg);
        };
        assert_eq!(results.round, round);
        assert_eq!(results.hp[&carol_id], hp);
        assert_eq!(results.hp_changes[&carol_id], -1);
        assert!(!results.spectators.contains(&carol_id));
    }

    let msg = carol
        .take_timeout(MessageKind::PlayerEliminated, Duration::from_secs(5))
        .await
        .expect("PlayerEliminated");
    assert!(matches!(
        &msg,
        Message::PlayerEliminated { player_id, .. } if *player_id == carol_id
    ));

    let msg = carol
        .take_timeout(MessageKind::RoundResults, Duration::from_secs(5))
        .await
        .expect("third RoundResults");
    let Message::RoundResults(results) = msg else {
        panic!("Expected RoundResults, got {:?}", msg);
    };
    assert_eq!(results.round, 3);
    assert_eq!(results.hp[&carol_id], 0);
    assert_eq!(results.spectators, vec![carol_id.clone()]);
    assert_eq!(results.new_scores["player-1"], 300);

    assert!(matches!(host.stop().await, Err(NetError::Cancelled)));
    for task in [alice_task, bob_task] {
        let outcome = timeout(Duration::from_secs(5), task)
            .await
            .expect("client did not notice the host leaving")
            .unwrap();
        assert!(matches!(outcome, Err(NetError::HostDisconnected)));
    }
}

#[tokio::test]
async fn game_over_follows_the_last_elimination_immediately() {
    let host = start_host(fast_config(1, 99), Some(Box::new(AutoPlayer::new()))).await;
    let alice = join(host.addr, "alice").await;

    let msg = alice
        .take_timeout(MessageKind::GameOver, Duration::from_secs(10))
        .await
        .expect("GameOver");
    let Message::GameOver { winner_id, stats } = msg else {
        panic!("Expected GameOver, got {:?}", msg);
    };
    assert_eq!(winner_id.as_deref(), Some("host"));
    assert!(stats["player-1"].is_spectator);
    assert_eq!(stats["player-1"].hp, 0);
    assert_eq!(stats["player-1"].name, "alice");
    assert!(!stats["host"].is_spectator);

    // No fourth round was dealt.
    let mut dealt = 0;
    while let Some(msg) = alice.try_take(MessageKind::NextPiece) {
        dealt += 1;
        assert!(matches!(msg, Message::NextPiece { round, .. } if round <= 3));
    }
    assert_eq!(dealt, 3);

    let summary = timeout(Duration::from_secs(5), host.handle)
        .await
        .expect("host did not finish")
        .unwrap()
        .expect("host result");
    assert_eq!(summary.rounds_played, 3);
    assert_eq!(summary.winner_id.as_deref(), Some("host"));
}

#[tokio::test]
async fn collection_ends_as_soon_as_everyone_reports() {
    let mut config = fast_config(2, 4242);
    config.collect_timeout = Duration::from_secs(30);
    config.barrier_timeout = Duration::from_secs(30);
    let host = start_host(config, None).await;

    let alice = join(host.addr, "alice").await;
    let bob = join(host.addr, "bob").await;
    let mut view = alice.view();

    let alice_task = spawn_play(alice, 100);
    let bob_task = spawn_play(bob, 300);

    timeout(
        Duration::from_secs(5),
        view.wait_for(|v| v.last_results.as_ref().map(|r| r.round >= 3).unwrap_or(false)),
    )
    .await
    .expect("three rounds should settle long before any timeout")
    .unwrap();

    {
        let current = view.borrow();
        let results = current.last_results.as_ref().unwrap();
        // alice holds the unique minimum every round.
        assert!(results.hp["player-1"] <= 8);
        assert_eq!(results.hp["player-2"], 10);
        assert!(current.current_piece.is_some());
    }

    let _ = host.stop().await;
    let _ = timeout(Duration::from_secs(5), alice_task).await;
    let _ = timeout(Duration::from_secs(5), bob_task).await;
}
