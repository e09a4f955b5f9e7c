//! Room Registry
//!
//! Rooms are owned by the surrounding platform. The session core only needs to
//! read a room, check membership, and flip its status as a game starts and
//! ends, so this module exposes exactly that plus an in-memory backend.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tokio::sync::RwLock;
use tracing::debug;

/// Lifecycle of a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Gathering players.
    Lobby,
    /// A session is running.
    InProgress,
    /// The session finished.
    Completed,
}

/// Who can find the room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomVisibility {
    /// Listed publicly.
    Public,
    /// Joinable by invite code only.
    Private,
}

/// A game room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRoom {
    /// Room id.
    pub id: String,
    /// Host user id.
    pub host_id: String,
    /// Member user ids (the host may or may not be listed).
    pub members: BTreeSet<String>,
    /// Current status.
    pub status: RoomStatus,
    /// Visibility.
    pub visibility: RoomVisibility,
    /// Seat limit, if any.
    pub max_players: Option<u32>,
    /// Invite code for private rooms.
    pub invite_code: Option<String>,
    /// Game played in this room.
    pub game_id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl GameRoom {
    /// Create a public lobby room with the host as its only member.
    pub fn new(id: impl Into<String>, host_id: impl Into<String>, game_id: impl Into<String>) -> Self {
        let now = Utc::now();
        let host_id = host_id.into();
        let mut members = BTreeSet::new();
        members.insert(host_id.clone());

        Self {
            id: id.into(),
            host_id,
            members,
            status: RoomStatus::Lobby,
            visibility: RoomVisibility::Public,
            max_players: None,
            invite_code: None,
            game_id: game_id.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a member (builder style, for fixtures and the demo binary).
    pub fn with_member(mut self, user_id: impl Into<String>) -> Self {
        self.members.insert(user_id.into());
        self
    }

    /// Host or member, compared on trimmed ids the same way `seating` does.
    pub fn is_participant(&self, user_id: &str) -> bool {
        let id = user_id.trim();
        !id.is_empty()
            && std::iter::once(&self.host_id)
                .chain(self.members.iter())
                .any(|candidate| candidate.trim() == id)
    }

    /// Seating for a new game: host first, then members, trimmed, empty ids
    /// dropped, each id once.
    pub fn seating(&self) -> Vec<String> {
        let mut seats: Vec<String> = Vec::with_capacity(self.members.len() + 1);
        let candidates = std::iter::once(self.host_id.as_str()).chain(self.members.iter().map(String::as_str));
        for raw in candidates {
            let id = raw.trim();
            if !id.is_empty() && !seats.iter().any(|s| s == id) {
                seats.push(id.to_string());
            }
        }
        seats
    }

    /// Move to a new status, bumping `updated_at`.
    pub fn set_status(&mut self, status: RoomStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
    }
}

/// Room registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// No room with this id.
    #[error("Room not found: {0}")]
    NotFound(String),
}

/// Read/update access to rooms.
#[async_trait]
pub trait RoomRegistry: Send + Sync {
    /// Fetch a room by id.
    async fn get_room(&self, room_id: &str) -> Option<GameRoom>;

    /// Overwrite an existing room.
    async fn save_room(&self, room: &GameRoom) -> Result<(), RoomError>;
}

/// Room registry held in process memory.
#[derive(Clone, Default)]
pub struct InMemoryRoomRegistry {
    rooms: Arc<RwLock<BTreeMap<String, GameRoom>>>,
}

impl InMemoryRoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a room. Room creation belongs to the platform; this
    /// is how fixtures and the binary seed rooms.
    pub async fn insert(&self, room: GameRoom) {
        debug!(room_id = %room.id, "Room registered");
        self.rooms.write().await.insert(room.id.clone(), room);
    }

    /// Number of rooms held.
    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Whether the registry holds no rooms.
    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}

#[async_trait]
impl RoomRegistry for InMemoryRoomRegistry {
    async fn get_room(&self, room_id: &str) -> Option<GameRoom> {
        self.rooms.read().await.get(room_id).cloned()
    }

    async fn save_room(&self, room: &GameRoom) -> Result<(), RoomError> {
        let mut rooms = self.rooms.write().await;
        match rooms.get_mut(&room.id) {
            Some(slot) => {
                *slot = room.clone();
                Ok(())
            }
            None => Err(RoomError::NotFound(room.id.clone())),
        }
    }
}
