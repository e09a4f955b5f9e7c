//! Gateway scenarios over fake connections (plain mpsc queues).

mod common;

use common::{drain, events, harness, seed_lobby, seed_running};
use std::time::Duration;

use exploding_cats::game::card::Card;
use exploding_cats::game::state::PlayerId;
use exploding_cats::network::{ErrorCode, ServerMessage};
use tokio::sync::mpsc;
use uuid::Uuid;

fn frame(event: &str, data: serde_json::Value) -> String {
    serde_json::json!({ "event": event, "data": data }).to_string()
}

#[tokio::test]
async fn test_start_broadcasts_to_room() {
    let h = harness();
    seed_lobby(&h, "r1", "host", &["guest"]).await;

    let (host_id, guest_id) = (Uuid::new_v4(), Uuid::new_v4());
    let (host_tx, mut host_rx) = mpsc::channel(32);
    let (guest_tx, mut guest_rx) = mpsc::channel(32);

    for (conn, tx, user) in [(host_id, &host_tx, "host"), (guest_id, &guest_tx, "guest")] {
        let join = frame("games.room.join", serde_json::json!({ "roomId": "r1", "userId": user }));
        h.gateway.handle_text(conn, &join, tx).await;
    }
    assert_eq!(events(&drain(&mut host_rx)), vec!["games.room.joined"]);
    assert_eq!(events(&drain(&mut guest_rx)), vec!["games.room.joined"]);

    let start = frame("games.session.start", serde_json::json!({ "roomId": "r1", "userId": "host" }));
    h.gateway.handle_text(host_id, &start, &host_tx).await;

    assert_eq!(
        events(&drain(&mut host_rx)),
        vec!["games.room.updated", "games.session.snapshot", "games.session.started"]
    );
    let guest_msgs = drain(&mut guest_rx);
    assert_eq!(events(&guest_msgs), vec!["games.room.updated", "games.session.snapshot"]);

    match &guest_msgs[1] {
        ServerMessage::Snapshot(payload) => {
            assert_eq!(payload.room_id, "r1");
            let session = payload.session.as_ref().unwrap();
            assert_eq!(session.snapshot().player_order.len(), 2);
        }
        other => panic!("Unexpected message: {:?}", other),
    }
}

#[tokio::test]
async fn test_rejection_goes_to_caller_only() {
    let h = harness();
    seed_running(&h, "r1", &["A", "B"], &[&[], &[]], &[Card::Skip, Card::Attack], 1).await;

    let (a_tx, mut a_rx) = mpsc::channel(32);
    let (b_tx, mut b_rx) = mpsc::channel(32);
    let (a_conn, b_conn) = (Uuid::new_v4(), Uuid::new_v4());
    h.gateway
        .handle_text(a_conn, &frame("games.room.join", serde_json::json!({ "roomId": "r1", "userId": "A" })), &a_tx)
        .await;
    h.gateway
        .handle_text(b_conn, &frame("games.room.join", serde_json::json!({ "roomId": "r1", "userId": "B" })), &b_tx)
        .await;
    drain(&mut a_rx);
    drain(&mut b_rx);

    let draw = frame("games.session.draw", serde_json::json!({ "roomId": "r1", "userId": "B" }));
    h.gateway.handle_text(b_conn, &draw, &b_tx).await;

    let b_msgs = drain(&mut b_rx);
    match b_msgs.as_slice() {
        [ServerMessage::Exception(err)] => {
            assert_eq!(err.code, ErrorCode::Forbidden);
            assert_eq!(err.event, "games.session.draw");
        }
        other => panic!("Unexpected messages: {:?}", other),
    }
    assert!(drain(&mut a_rx).is_empty());
}

#[tokio::test]
async fn test_accepted_move_acks_caller_and_broadcasts() {
    let h = harness();
    seed_running(&h, "r1", &["A", "B"], &[&[Card::Attack], &[]], &[Card::Skip], 1).await;

    let (a_tx, mut a_rx) = mpsc::channel(32);
    let (b_tx, mut b_rx) = mpsc::channel(32);
    let (a_conn, b_conn) = (Uuid::new_v4(), Uuid::new_v4());
    h.gateway
        .handle_text(a_conn, &frame("games.room.join", serde_json::json!({ "roomId": "r1", "userId": "A" })), &a_tx)
        .await;
    h.gateway
        .handle_text(b_conn, &frame("games.room.join", serde_json::json!({ "roomId": "r1", "userId": "B" })), &b_tx)
        .await;
    drain(&mut a_rx);
    drain(&mut b_rx);

    let attack = frame(
        "games.session.play_action",
        serde_json::json!({ "roomId": " r1 ", "userId": "A", "card": "ATTACK" }),
    );
    h.gateway.handle_text(a_conn, &attack, &a_tx).await;

    assert_eq!(
        events(&drain(&mut a_rx)),
        vec!["games.session.snapshot", "games.session.action.played"]
    );
    let b_msgs = drain(&mut b_rx);
    assert_eq!(events(&b_msgs), vec!["games.session.snapshot"]);
    match &b_msgs[0] {
        ServerMessage::Snapshot(payload) => {
            let snapshot = payload.session.as_ref().unwrap().snapshot();
            assert_eq!(snapshot.pending_draws, 2);
            assert_eq!(snapshot.current_player().map(|p| p.as_str()), Some("B"));
        }
        other => panic!("Unexpected message: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_payloads_rejected() {
    let h = harness();
    seed_running(&h, "r1", &["A", "B"], &[&[], &[]], &[Card::Skip], 1).await;
    let (tx, mut rx) = mpsc::channel(32);
    let conn = Uuid::new_v4();

    let cases = [
        frame("games.session.play_action", serde_json::json!({ "roomId": "r1", "userId": "A", "card": "defuse" })),
        frame("games.session.play_cat_combo", serde_json::json!({
            "roomId": "r1", "userId": "A", "cat": "tacocat", "mode": "trio", "targetPlayerId": "B"
        })),
        frame("games.session.draw", serde_json::json!({ "roomId": "r1" })),
        frame("games.session.teleport", serde_json::json!({})),
    ];

    for case in &cases {
        h.gateway.handle_text(conn, case, &tx).await;
        match drain(&mut rx).as_slice() {
            [ServerMessage::Exception(err)] => assert_eq!(err.code, ErrorCode::InvalidInput),
            other => panic!("Unexpected messages for {case}: {:?}", other),
        }
    }

    // Nothing was committed.
    let session = h.service.get_session("r1").await.unwrap().unwrap();
    assert_eq!(session.lock_version, 1);
}

#[tokio::test]
async fn test_session_request_replies_to_requester() {
    let h = harness();
    seed_running(&h, "r1", &["A", "B"], &[&[], &[]], &[Card::Skip], 1).await;
    let (tx, mut rx) = mpsc::channel(32);

    let request = frame("games.session.request", serde_json::json!({ "roomId": "r1" }));
    h.gateway.handle_text(Uuid::new_v4(), &request, &tx).await;

    match drain(&mut rx).as_slice() {
        [ServerMessage::Snapshot(payload)] => assert_eq!(payload.session.as_ref().unwrap().lock_version, 1),
        other => panic!("Unexpected messages: {:?}", other),
    }
}

#[tokio::test]
async fn test_padded_member_can_join_after_start() {
    let h = harness();
    seed_lobby(&h, "r1", "host", &[" guest "]).await;

    let (_room, session) = h.service.start_session("host", "r1", None).await.unwrap();
    assert_eq!(
        session.snapshot().player_order,
        vec![PlayerId::from("host"), PlayerId::from("guest")]
    );

    let (tx, mut rx) = mpsc::channel(32);
    let join = frame("games.room.join", serde_json::json!({ "roomId": "r1", "userId": "guest" }));
    h.gateway.handle_text(Uuid::new_v4(), &join, &tx).await;

    assert_eq!(events(&drain(&mut rx)), vec!["games.room.joined"]);
    assert_eq!(h.hub.room_size("r1").await, 1);
}

#[tokio::test]
async fn test_join_running_session_replies_to_joiner_only() {
    let h = harness();
    seed_running(&h, "r1", &["A", "B"], &[&[Card::Skip], &[]], &[Card::Attack], 1).await;

    let (a_tx, mut a_rx) = mpsc::channel(32);
    let (b_tx, mut b_rx) = mpsc::channel(32);
    h.gateway
        .handle_text(Uuid::new_v4(), &frame("games.room.join", serde_json::json!({ "roomId": "r1", "userId": "A" })), &a_tx)
        .await;
    drain(&mut a_rx);

    h.gateway
        .handle_text(Uuid::new_v4(), &frame("games.room.join", serde_json::json!({ "roomId": "r1", "userId": "B" })), &b_tx)
        .await;

    match drain(&mut b_rx).as_slice() {
        [ServerMessage::RoomJoined(payload)] => {
            assert_eq!(payload.room.id, "r1");
            let session = payload.session.as_ref().unwrap();
            assert_eq!(session.lock_version, 1);
            assert_eq!(session.snapshot().current_player(), Some(&PlayerId::from("A")));
        }
        other => panic!("Unexpected messages: {:?}", other),
    }
    assert!(drain(&mut a_rx).is_empty());
    assert_eq!(h.hub.room_size("r1").await, 2);
}

#[tokio::test]
async fn test_stalled_subscriber_does_not_block_moves() {
    let h = harness();
    seed_running(&h, "r1", &["A", "B"], &[&[], &[]], &[Card::Skip, Card::Attack], 1).await;

    let (a_tx, mut a_rx) = mpsc::channel(64);
    let (a_conn, b_conn) = (Uuid::new_v4(), Uuid::new_v4());
    h.gateway
        .handle_text(a_conn, &frame("games.room.join", serde_json::json!({ "roomId": "r1", "userId": "A" })), &a_tx)
        .await;

    // B's single slot is taken by its own join reply and never drained.
    let (b_tx, _b_rx) = mpsc::channel(1);
    h.gateway
        .handle_text(b_conn, &frame("games.room.join", serde_json::json!({ "roomId": "r1", "userId": "B" })), &b_tx)
        .await;
    drain(&mut a_rx);

    let draw = frame("games.session.draw", serde_json::json!({ "roomId": "r1", "userId": "A" }));
    let handled = tokio::time::timeout(Duration::from_secs(2), h.gateway.handle_text(a_conn, &draw, &a_tx)).await;
    assert!(handled.is_ok());

    assert_eq!(
        events(&drain(&mut a_rx)),
        vec!["games.session.snapshot", "games.session.drawn"]
    );
    assert_eq!(h.hub.room_size("r1").await, 1);
    let stored = h.service.get_session("r1").await.unwrap().unwrap();
    assert_eq!(stored.lock_version, 2);
}
