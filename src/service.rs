//! Session Service
//!
//! Runs the Exploding Cats engine against persisted sessions. Every mutation
//! reads the session, computes the transition, and commits with a conditional
//! write on `lock_version`. Room status follows the session: `in_progress`
//! once dealt, `completed` once a winner is known.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::core::rng::DeterministicRng;
use crate::game::card::Card;
use crate::game::engine::{self, ActionContext, Combo, ComboMode, GameAction, RuleError};
use crate::game::state::PlayerId;
use crate::rooms::{GameRoom, RoomError, RoomRegistry, RoomStatus};
use crate::store::{Engine, GameSession, SessionStore, StoreError};

/// Session service errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Request is malformed or breaks a game rule.
    #[error("{0}")]
    Validation(String),

    /// Caller may not perform this action.
    #[error("{0}")]
    Forbidden(String),

    /// Room or session does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Lost a race against another write.
    #[error("{0}")]
    Conflict(String),

    /// Storage failure.
    #[error("{0}")]
    Internal(String),
}

impl From<RuleError> for SessionError {
    fn from(err: RuleError) -> Self {
        match err {
            RuleError::NotYourTurn => SessionError::Forbidden(err.to_string()),
            other => SessionError::Validation(other.to_string()),
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(_) | StoreError::VersionMismatch { .. } => {
                SessionError::Conflict(err.to_string())
            }
            StoreError::NotFound(_) => SessionError::NotFound(err.to_string()),
            StoreError::Codec(_) => SessionError::Internal(err.to_string()),
        }
    }
}

impl From<RoomError> for SessionError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::NotFound(_) => SessionError::NotFound(err.to_string()),
        }
    }
}

/// Observer of committed changes.
#[async_trait]
pub trait SessionListener: Send + Sync {
    /// A room's status changed.
    async fn room_updated(&self, room: &GameRoom);

    /// A session snapshot was committed.
    async fn session_updated(&self, session: &GameSession);
}

/// Orchestrates rooms, sessions and the rules engine.
pub struct SessionService {
    rooms: Arc<dyn RoomRegistry>,
    sessions: Arc<dyn SessionStore>,
    listeners: Vec<Arc<dyn SessionListener>>,
}

impl SessionService {
    /// Create a service over the given backends.
    pub fn new(rooms: Arc<dyn RoomRegistry>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            rooms,
            sessions,
            listeners: Vec::new(),
        }
    }

    /// Register a listener notified after every commit.
    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Fetch a room.
    pub async fn get_room(&self, room_id: &str) -> Result<GameRoom, SessionError> {
        self.rooms
            .get_room(room_id.trim())
            .await
            .ok_or_else(|| SessionError::NotFound(format!("Room not found: {}", room_id.trim())))
    }

    /// Fetch the session of a room, if one was started.
    pub async fn get_session(&self, room_id: &str) -> Result<Option<GameSession>, SessionError> {
        Ok(self.sessions.get_by_room(room_id.trim()).await?)
    }

    // =========================================================================
    // START
    // =========================================================================

    /// Deal a new game for a lobby room. Only the host may start.
    #[instrument(skip(self))]
    pub async fn start_session(
        &self,
        host_id: &str,
        room_id: &str,
        engine_override: Option<Engine>,
    ) -> Result<(GameRoom, GameSession), SessionError> {
        let host_id = host_id.trim();
        let mut room = self.get_room(room_id).await?;

        if room.host_id != host_id {
            return Err(SessionError::Forbidden("Only the host can start the game".to_string()));
        }
        if room.status != RoomStatus::Lobby {
            return Err(SessionError::Validation("Room is not in the lobby".to_string()));
        }

        let engine = Engine::for_game(&room.game_id).ok_or_else(|| {
            SessionError::Validation(format!("Game {} is not supported", room.game_id))
        })?;
        if let Some(requested) = engine_override {
            if requested != engine {
                return Err(SessionError::Validation(format!(
                    "Engine {requested} cannot run game {}",
                    room.game_id
                )));
            }
        }

        let seating: Vec<PlayerId> = room.seating().into_iter().map(PlayerId::from).collect();
        if seating.len() < 2 {
            return Err(SessionError::Validation(
                "At least two players are required to start".to_string(),
            ));
        }

        let now = Utc::now();
        let mut ctx = action_context(&room.id, 0, now);
        let transition = engine::initialize(&seating, &mut ctx)?;

        let session = GameSession::new(room.id.clone(), room.game_id.clone(), engine, transition.state, now);
        let session = self.sessions.create(session).await?;

        room.set_status(RoomStatus::InProgress, now);
        self.rooms.save_room(&room).await?;

        info!(
            room_id = %room.id,
            session_id = %session.id,
            players = seating.len(),
            "Session started"
        );

        self.notify_room(&room).await;
        self.notify_session(&session).await;

        Ok((room, session))
    }

    // =========================================================================
    // PLAYER ACTIONS
    // =========================================================================

    /// Draw for the player holding the turn.
    #[instrument(skip(self))]
    pub async fn draw(&self, user_id: &str, room_id: &str) -> Result<GameSession, SessionError> {
        self.run_action(user_id, room_id, GameAction::Draw).await
    }

    /// Play a Skip or Attack.
    #[instrument(skip(self))]
    pub async fn play_action(
        &self,
        user_id: &str,
        room_id: &str,
        card: Card,
    ) -> Result<GameSession, SessionError> {
        let action = match card {
            Card::Skip => GameAction::PlaySkip,
            Card::Attack => GameAction::PlayAttack,
            other => {
                return Err(SessionError::Validation(format!(
                    "Card {other} cannot be played as an action"
                )))
            }
        };
        self.run_action(user_id, room_id, action).await
    }

    /// Play a cat pair or trio.
    #[instrument(skip(self))]
    pub async fn play_cat_combo(
        &self,
        user_id: &str,
        room_id: &str,
        cat: Card,
        mode: ComboMode,
        target_id: &str,
        desired: Option<Card>,
    ) -> Result<GameSession, SessionError> {
        let target_id = target_id.trim();
        if target_id.is_empty() {
            return Err(SessionError::Validation("A target player is required".to_string()));
        }

        let combo = match (mode, desired) {
            (ComboMode::Pair, _) => Combo::Pair,
            (ComboMode::Trio, Some(desired)) => Combo::Trio { desired },
            (ComboMode::Trio, None) => {
                return Err(SessionError::Validation(
                    "A trio requires a desired card".to_string(),
                ))
            }
        };

        let action = GameAction::PlayCatCombo {
            cat,
            combo,
            target: PlayerId::from(target_id),
        };
        self.run_action(user_id, room_id, action).await
    }

    /// Shared read-compute-commit path for player moves.
    async fn run_action(
        &self,
        user_id: &str,
        room_id: &str,
        action: GameAction,
    ) -> Result<GameSession, SessionError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(SessionError::Validation("A user id is required".to_string()));
        }

        let mut room = self.get_room(room_id).await?;
        if room.status != RoomStatus::InProgress {
            return Err(SessionError::Validation("Game is not in progress".to_string()));
        }

        let session = self
            .sessions
            .get_by_room(&room.id)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("No session for room {}", room.id)))?;

        if Engine::for_game(&room.game_id) != Some(session.engine) {
            return Err(SessionError::Validation(format!(
                "Session engine {} does not match game {}",
                session.engine, room.game_id
            )));
        }

        let actor = PlayerId::from(user_id);
        let snapshot = session.snapshot();
        match snapshot.player(&actor) {
            None => {
                return Err(SessionError::Forbidden(
                    "You are not a player in this game".to_string(),
                ))
            }
            Some(player) if !player.alive => {
                return Err(SessionError::Forbidden("You have been eliminated".to_string()))
            }
            Some(_) => {}
        }
        if !snapshot.is_turn_of(&actor) {
            return Err(RuleError::NotYourTurn.into());
        }

        let now = Utc::now();
        let expected_version = session.lock_version;
        let mut ctx = action_context(&room.id, expected_version, now);
        let transition = engine::apply(snapshot, &actor, &action, &mut ctx)?;

        #[cfg(feature = "debug-tracing")]
        debug!(room_id = %room.id, snapshot = ?transition.state, "Transition computed");

        let completed = transition.completed;
        let mut next = session;
        next.replace_snapshot(transition.state, completed, now);

        let committed = match self.sessions.update(next, expected_version).await {
            Ok(committed) => committed,
            Err(e) => {
                warn!(room_id = %room.id, user_id, error = %e, "Session commit failed");
                return Err(e.into());
            }
        };

        debug!(
            room_id = %room.id,
            user_id,
            lock_version = committed.lock_version,
            new_logs = transition.logs.len(),
            "Action committed"
        );

        if completed {
            room.set_status(RoomStatus::Completed, now);
            self.rooms.save_room(&room).await?;
            info!(
                room_id = %room.id,
                winner = ?committed.snapshot().winner(),
                "Session completed"
            );
            self.notify_room(&room).await;
        }

        self.notify_session(&committed).await;
        Ok(committed)
    }

    async fn notify_room(&self, room: &GameRoom) {
        for listener in &self.listeners {
            listener.room_updated(room).await;
        }
    }

    async fn notify_session(&self, session: &GameSession) {
        for listener in &self.listeners {
            listener.session_updated(session).await;
        }
    }
}

/// Fresh per-action randomness. The entropy is unpredictable to clients; the
/// room id and lock version keep seeds distinct across rooms and moves.
fn action_context(room_id: &str, lock_version: u64, now: DateTime<Utc>) -> ActionContext {
    let entropy = Uuid::new_v4().into_bytes();
    ActionContext {
        rng: DeterministicRng::from_action_params(&entropy, room_id, lock_version),
        now,
    }
}
