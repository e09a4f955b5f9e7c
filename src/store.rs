//! Session Store
//!
//! One session document per room. Writes after creation are conditional on
//! `lock_version`: a writer passes the version it read, and the write is
//! rejected if anyone committed in between.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::game::state::ExplodingCatsState;

/// Game id served by this crate.
pub const EXPLODING_CATS_GAME_ID: &str = "exploding-cats";

/// Schema version of the state envelope.
pub const SESSION_STATE_VERSION: u32 = 1;

// =============================================================================
// ENGINE
// =============================================================================

/// Rules engine driving a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Engine {
    /// Exploding Cats, first rules revision.
    #[serde(rename = "exploding_cats_v1")]
    ExplodingCatsV1,
}

impl Engine {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Engine::ExplodingCatsV1 => "exploding_cats_v1",
        }
    }

    /// Default engine for a game id.
    pub fn for_game(game_id: &str) -> Option<Engine> {
        match game_id.trim() {
            EXPLODING_CATS_GAME_ID => Some(Engine::ExplodingCatsV1),
            _ => None,
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exploding_cats_v1" => Ok(Engine::ExplodingCatsV1),
            other => Err(format!("unsupported engine: {other}")),
        }
    }
}

// =============================================================================
// SESSION DOCUMENT
// =============================================================================

/// Lifecycle of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created but not dealt.
    Waiting,
    /// Being played.
    Active,
    /// Has a result.
    Completed,
}

/// Versioned wrapper around the engine snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStateEnvelope {
    /// Engine that produced the snapshot.
    pub engine: Engine,
    /// Envelope schema version.
    pub version: u32,
    /// Engine snapshot.
    pub snapshot: ExplodingCatsState,
    /// When the snapshot last changed.
    pub last_updated_at: DateTime<Utc>,
}

/// Persisted session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    /// Session id.
    pub id: String,
    /// Owning room.
    pub room_id: String,
    /// Game played.
    pub game_id: String,
    /// Rules engine.
    pub engine: Engine,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Engine state.
    pub state: SessionStateEnvelope,
    /// Incremented by every committed write.
    pub lock_version: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
}

impl GameSession {
    /// Build a fresh active session around an initial snapshot.
    pub fn new(
        room_id: impl Into<String>,
        game_id: impl Into<String>,
        engine: Engine,
        snapshot: ExplodingCatsState,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.into(),
            game_id: game_id.into(),
            engine,
            status: SessionStatus::Active,
            state: SessionStateEnvelope {
                engine,
                version: SESSION_STATE_VERSION,
                snapshot,
                last_updated_at: now,
            },
            lock_version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current engine snapshot.
    pub fn snapshot(&self) -> &ExplodingCatsState {
        &self.state.snapshot
    }

    /// Replace the snapshot after a transition.
    pub fn replace_snapshot(&mut self, snapshot: ExplodingCatsState, completed: bool, now: DateTime<Utc>) {
        self.state.snapshot = snapshot;
        self.state.last_updated_at = now;
        self.updated_at = now;
        if completed {
            self.status = SessionStatus::Completed;
        }
    }

    /// Check whether the session is over.
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Session store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Room already has a session.
    #[error("Room {0} already has a session")]
    AlreadyExists(String),

    /// Room has no session.
    #[error("No session for room {0}")]
    NotFound(String),

    /// Someone else committed first.
    #[error("Session was modified concurrently (expected version {expected}, found {actual})")]
    VersionMismatch {
        /// Version the writer read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// Stored document could not be encoded or decoded.
    #[error("Session encoding failed: {0}")]
    Codec(String),
}

/// Persistence for session documents.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the session of a room.
    async fn get_by_room(&self, room_id: &str) -> Result<Option<GameSession>, StoreError>;

    /// Insert a session. Fails if the room already has one.
    async fn create(&self, session: GameSession) -> Result<GameSession, StoreError>;

    /// Overwrite a session if its stored `lock_version` still equals
    /// `expected_lock_version`. Returns the committed document with the
    /// bumped version.
    async fn update(
        &self,
        session: GameSession,
        expected_lock_version: u64,
    ) -> Result<GameSession, StoreError>;
}

/// Session store held in process memory as bincode documents.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    documents: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Whether the store holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

fn encode(session: &GameSession) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(session).map_err(|e| StoreError::Codec(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<GameSession, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Codec(e.to_string()))
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_by_room(&self, room_id: &str) -> Result<Option<GameSession>, StoreError> {
        let documents = self.documents.read().await;
        documents.get(room_id).map(|bytes| decode(bytes)).transpose()
    }

    async fn create(&self, session: GameSession) -> Result<GameSession, StoreError> {
        let mut documents = self.documents.write().await;
        if documents.contains_key(&session.room_id) {
            return Err(StoreError::AlreadyExists(session.room_id));
        }

        let bytes = encode(&session)?;
        debug!(room_id = %session.room_id, session_id = %session.id, bytes = bytes.len(), "Session created");
        documents.insert(session.room_id.clone(), bytes);
        Ok(session)
    }

    async fn update(
        &self,
        mut session: GameSession,
        expected_lock_version: u64,
    ) -> Result<GameSession, StoreError> {
        let mut documents = self.documents.write().await;
        let stored = documents
            .get(&session.room_id)
            .ok_or_else(|| StoreError::NotFound(session.room_id.clone()))?;

        let actual = decode(stored)?.lock_version;
        if actual != expected_lock_version {
            warn!(
                room_id = %session.room_id,
                expected = expected_lock_version,
                actual,
                "Rejected stale session write"
            );
            return Err(StoreError::VersionMismatch { expected: expected_lock_version, actual });
        }

        session.lock_version = expected_lock_version + 1;
        let bytes = encode(&session)?;
        documents.insert(session.room_id.clone(), bytes);
        debug!(room_id = %session.room_id, lock_version = session.lock_version, "Session updated");
        Ok(session)
    }
}
