//! Shared fixtures for integration tests: in-memory backends wired the same
//! way the binary wires them, plus helpers for hand-built sessions.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use exploding_cats::game::card::Card;
use exploding_cats::game::state::{ExplodingCatsState, PlayerId, PlayerState};
use exploding_cats::network::{Gateway, RoomHub, ServerMessage};
use exploding_cats::rooms::{GameRoom, InMemoryRoomRegistry, RoomStatus};
use exploding_cats::service::SessionService;
use exploding_cats::store::{
    Engine, GameSession, InMemorySessionStore, SessionStore, EXPLODING_CATS_GAME_ID,
};

pub struct Harness {
    pub rooms: InMemoryRoomRegistry,
    pub store: InMemorySessionStore,
    pub hub: Arc<RoomHub>,
    pub service: Arc<SessionService>,
    pub gateway: Gateway,
}

pub fn harness() -> Harness {
    let rooms = InMemoryRoomRegistry::new();
    let store = InMemorySessionStore::new();
    let hub = Arc::new(RoomHub::new());
    let service = Arc::new(
        SessionService::new(Arc::new(rooms.clone()), Arc::new(store.clone()))
            .with_listener(hub.clone()),
    );
    let gateway = Gateway::new(service.clone(), hub.clone());
    Harness { rooms, store, hub, service, gateway }
}

/// Lobby room hosted by `host` with the given members.
pub async fn seed_lobby(h: &Harness, room_id: &str, host: &str, members: &[&str]) -> GameRoom {
    let mut room = GameRoom::new(room_id, host, EXPLODING_CATS_GAME_ID);
    for m in members {
        room = room.with_member(*m);
    }
    h.rooms.insert(room.clone()).await;
    room
}

/// In-progress room with a hand-built session. The first player hosts and
/// holds the turn.
pub async fn seed_running(
    h: &Harness,
    room_id: &str,
    order: &[&str],
    hands: &[&[Card]],
    deck: &[Card],
    pending_draws: u32,
) -> GameSession {
    let mut room = seed_lobby(h, room_id, order[0], &order[1..]).await;
    room.status = RoomStatus::InProgress;
    h.rooms.insert(room).await;

    let snapshot = ExplodingCatsState {
        deck: deck.to_vec(),
        discard_pile: Vec::new(),
        player_order: order.iter().map(|id| PlayerId::from(*id)).collect(),
        current_turn_index: 0,
        pending_draws,
        players: order
            .iter()
            .zip(hands)
            .map(|(id, hand)| PlayerState {
                player_id: PlayerId::from(*id),
                hand: hand.to_vec(),
                alive: true,
            })
            .collect(),
        logs: Vec::new(),
    };

    let session = GameSession::new(
        room_id,
        EXPLODING_CATS_GAME_ID,
        Engine::ExplodingCatsV1,
        snapshot,
        Utc::now(),
    );
    h.store.create(session).await.unwrap()
}

/// Everything queued on a fake connection so far.
pub fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

/// Event name of each message, for order assertions.
pub fn events(messages: &[ServerMessage]) -> Vec<String> {
    messages
        .iter()
        .map(|m| {
            let json: serde_json::Value = serde_json::from_str(&m.to_json().unwrap()).unwrap();
            json["event"].as_str().unwrap_or_default().to_string()
        })
        .collect()
}
