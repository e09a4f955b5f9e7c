//! Room Channels
//!
//! Tracks which connections joined which room and fans server messages out to
//! them. The hub is the session service's listener: committed snapshots and
//! room status changes reach every subscriber of the room.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::network::protocol::{RoomPayload, ServerMessage, SnapshotPayload};
use crate::rooms::GameRoom;
use crate::service::SessionListener;
use crate::store::GameSession;

/// Connection identifier.
pub type ConnectionId = Uuid;

/// Room id -> subscribed connections.
type RoomChannels = BTreeMap<String, BTreeMap<ConnectionId, mpsc::Sender<ServerMessage>>>;

/// Registry of room subscriptions.
#[derive(Default)]
pub struct RoomHub {
    rooms: RwLock<RoomChannels>,
}

impl RoomHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection to a room. Joining twice is harmless.
    pub async fn join(&self, room_id: &str, connection: ConnectionId, sender: mpsc::Sender<ServerMessage>) {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(connection, sender);
        debug!(room_id, %connection, "Connection joined room channel");
    }

    /// Drop a closed connection from every room. Returns how many rooms it
    /// was subscribed to.
    pub async fn remove_connection(&self, connection: ConnectionId) -> usize {
        let mut rooms = self.rooms.write().await;
        let mut removed = 0;
        rooms.retain(|_, members| {
            if members.remove(&connection).is_some() {
                removed += 1;
            }
            !members.is_empty()
        });
        removed
    }

    /// Send a message to every subscriber of a room. Returns the number of
    /// connections that accepted it.
    ///
    /// Never waits on a subscriber: a connection whose queue is full or
    /// closed is dropped from the room and misses this and later updates.
    pub async fn broadcast(&self, room_id: &str, message: ServerMessage) -> usize {
        // Snapshot the senders so no lock is held across sends.
        let senders: Vec<(ConnectionId, mpsc::Sender<ServerMessage>)> = {
            let rooms = self.rooms.read().await;
            match rooms.get(room_id) {
                Some(members) => members.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        let mut stalled = Vec::new();
        for (connection, sender) in senders {
            match sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(room_id, %connection, "Subscriber queue full, evicting from room");
                    stalled.push(connection);
                }
                Err(TrySendError::Closed(_)) => stalled.push(connection),
            }
        }

        if !stalled.is_empty() {
            self.evict(room_id, &stalled).await;
        }
        delivered
    }

    /// Unsubscribe connections from one room.
    async fn evict(&self, room_id: &str, connections: &[ConnectionId]) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(room_id) {
            for connection in connections {
                members.remove(connection);
            }
            if members.is_empty() {
                rooms.remove(room_id);
            }
        }
    }

    /// Number of connections subscribed to a room.
    pub async fn room_size(&self, room_id: &str) -> usize {
        self.rooms.read().await.get(room_id).map_or(0, BTreeMap::len)
    }

    /// Number of rooms with at least one subscriber.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

#[async_trait]
impl SessionListener for RoomHub {
    async fn room_updated(&self, room: &GameRoom) {
        let delivered = self
            .broadcast(&room.id, ServerMessage::RoomUpdated(RoomPayload { room: room.clone() }))
            .await;
        debug!(room_id = %room.id, delivered, "Room update broadcast");
    }

    async fn session_updated(&self, session: &GameSession) {
        let message = ServerMessage::Snapshot(SnapshotPayload {
            room_id: session.room_id.clone(),
            session: Some(session.clone()),
        });
        let delivered = self.broadcast(&session.room_id, message).await;
        debug!(room_id = %session.room_id, lock_version = session.lock_version, delivered, "Snapshot broadcast");
    }
}
