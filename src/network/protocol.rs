//! Protocol Messages
//!
//! Wire format for the `games` namespace. Every frame is a JSON text message
//! shaped `{"event": "games.…", "data": {…}}` with camelCase fields.
//!
//! Inbound payload fields are optional on the wire so that a missing field
//! produces a protocol error naming it instead of a generic parse failure.
//! `validate()` on each request trims strings, lower-cases enum names, and
//! yields a typed command.

use serde::{Serialize, Deserialize};

use crate::game::card::Card;
use crate::game::engine::ComboMode;
use crate::rooms::GameRoom;
use crate::service::SessionError;
use crate::store::{Engine, GameSession};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    /// Subscribe to a room.
    #[serde(rename = "games.room.join")]
    RoomJoin(RoomJoinRequest),

    /// Re-send the current snapshot to the caller.
    #[serde(rename = "games.session.request")]
    SessionRequest(SessionRequest),

    /// Draw a card.
    #[serde(rename = "games.session.draw")]
    Draw(DrawRequest),

    /// Play a Skip or Attack.
    #[serde(rename = "games.session.play_action")]
    PlayAction(PlayActionRequest),

    /// Play a cat pair or trio.
    #[serde(rename = "games.session.play_cat_combo")]
    PlayCatCombo(PlayCatComboRequest),

    /// Host starts the game.
    #[serde(rename = "games.session.start")]
    Start(StartRequest),

    /// Keepalive.
    #[serde(rename = "games.ping")]
    Ping(PingRequest),
}

impl ClientMessage {
    /// Event name of this message.
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::RoomJoin(_) => "games.room.join",
            ClientMessage::SessionRequest(_) => "games.session.request",
            ClientMessage::Draw(_) => "games.session.draw",
            ClientMessage::PlayAction(_) => "games.session.play_action",
            ClientMessage::PlayCatCombo(_) => "games.session.play_cat_combo",
            ClientMessage::Start(_) => "games.session.start",
            ClientMessage::Ping(_) => "games.ping",
        }
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Best-effort event name of a frame that failed to parse.
pub fn peek_event(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("event").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

/// `games.room.join` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoinRequest {
    /// Room to join.
    pub room_id: Option<String>,
    /// Joining user.
    pub user_id: Option<String>,
}

/// `games.session.request` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    /// Room whose snapshot is wanted.
    pub room_id: Option<String>,
}

/// `games.session.draw` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawRequest {
    /// Room of the session.
    pub room_id: Option<String>,
    /// Drawing user.
    pub user_id: Option<String>,
}

/// `games.session.play_action` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayActionRequest {
    /// Room of the session.
    pub room_id: Option<String>,
    /// Acting user.
    pub user_id: Option<String>,
    /// `skip` or `attack`.
    pub card: Option<String>,
}

/// `games.session.play_cat_combo` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayCatComboRequest {
    /// Room of the session.
    pub room_id: Option<String>,
    /// Acting user.
    pub user_id: Option<String>,
    /// One of the five cat cards.
    pub cat: Option<String>,
    /// `pair` or `trio`.
    pub mode: Option<String>,
    /// Player being robbed.
    pub target_player_id: Option<String>,
    /// Card asked for (trio only).
    pub desired_card: Option<String>,
}

/// `games.session.start` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    /// Room to start.
    pub room_id: Option<String>,
    /// Starting user (must be the host).
    pub user_id: Option<String>,
    /// Engine override.
    pub engine: Option<String>,
}

/// `games.ping` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingRequest {
    /// Client timestamp echoed back.
    #[serde(default)]
    pub timestamp: u64,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Malformed inbound payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Required field absent or blank.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Field present but not an accepted value.
    #[error("Invalid value for {field}: {value}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Normalized value received.
        value: String,
    },
}

fn required(field: &'static str, value: &Option<String>) -> Result<String, ProtocolError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ProtocolError::MissingField(field)),
    }
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_card(field: &'static str, raw: &str) -> Result<Card, ProtocolError> {
    raw.parse::<Card>().map_err(|e| ProtocolError::InvalidValue { field, value: e.0 })
}

/// Room and user of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorCommand {
    /// Room id.
    pub room_id: String,
    /// User id.
    pub user_id: String,
}

/// Validated `games.session.play_action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayActionCommand {
    /// Room id.
    pub room_id: String,
    /// User id.
    pub user_id: String,
    /// Skip or Attack.
    pub card: Card,
}

/// Validated `games.session.play_cat_combo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayCatComboCommand {
    /// Room id.
    pub room_id: String,
    /// User id.
    pub user_id: String,
    /// Cat card.
    pub cat: Card,
    /// Pair or trio.
    pub mode: ComboMode,
    /// Target user.
    pub target_player_id: String,
    /// Requested card; always set for a trio, always `None` for a pair.
    pub desired_card: Option<Card>,
}

/// Validated `games.session.start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCommand {
    /// Room id.
    pub room_id: String,
    /// User id.
    pub user_id: String,
    /// Requested engine.
    pub engine: Option<Engine>,
}

impl RoomJoinRequest {
    /// Validate and normalize.
    pub fn validate(&self) -> Result<ActorCommand, ProtocolError> {
        Ok(ActorCommand {
            room_id: required("roomId", &self.room_id)?,
            user_id: required("userId", &self.user_id)?,
        })
    }
}

impl SessionRequest {
    /// Validate and normalize. Returns the room id.
    pub fn validate(&self) -> Result<String, ProtocolError> {
        required("roomId", &self.room_id)
    }
}

impl DrawRequest {
    /// Validate and normalize.
    pub fn validate(&self) -> Result<ActorCommand, ProtocolError> {
        Ok(ActorCommand {
            room_id: required("roomId", &self.room_id)?,
            user_id: required("userId", &self.user_id)?,
        })
    }
}

impl PlayActionRequest {
    /// Validate and normalize. Only Skip and Attack are accepted.
    pub fn validate(&self) -> Result<PlayActionCommand, ProtocolError> {
        let room_id = required("roomId", &self.room_id)?;
        let user_id = required("userId", &self.user_id)?;
        let card = parse_card("card", &required("card", &self.card)?)?;
        if !card.is_action() {
            return Err(ProtocolError::InvalidValue { field: "card", value: card.to_string() });
        }
        Ok(PlayActionCommand { room_id, user_id, card })
    }
}

impl PlayCatComboRequest {
    /// Validate and normalize. A trio must name `desiredCard`.
    pub fn validate(&self) -> Result<PlayCatComboCommand, ProtocolError> {
        let room_id = required("roomId", &self.room_id)?;
        let user_id = required("userId", &self.user_id)?;

        let cat = parse_card("cat", &required("cat", &self.cat)?)?;
        if !cat.is_combo() {
            return Err(ProtocolError::InvalidValue { field: "cat", value: cat.to_string() });
        }

        let mode = match required("mode", &self.mode)?.to_ascii_lowercase().as_str() {
            "pair" => ComboMode::Pair,
            "trio" => ComboMode::Trio,
            other => {
                return Err(ProtocolError::InvalidValue { field: "mode", value: other.to_string() })
            }
        };

        let target_player_id = required("targetPlayerId", &self.target_player_id)?;

        let desired_card = match mode {
            ComboMode::Pair => None,
            ComboMode::Trio => Some(parse_card(
                "desiredCard",
                &required("desiredCard", &self.desired_card)?,
            )?),
        };

        Ok(PlayCatComboCommand { room_id, user_id, cat, mode, target_player_id, desired_card })
    }
}

impl StartRequest {
    /// Validate and normalize.
    pub fn validate(&self) -> Result<StartCommand, ProtocolError> {
        let room_id = required("roomId", &self.room_id)?;
        let user_id = required("userId", &self.user_id)?;
        let engine = match optional(&self.engine) {
            Some(raw) => Some(raw.parse::<Engine>().map_err(|_| ProtocolError::InvalidValue {
                field: "engine",
                value: raw.to_ascii_lowercase(),
            })?),
            None => None,
        };
        Ok(StartCommand { room_id, user_id, engine })
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    /// Join confirmed, sent to the joiner only.
    #[serde(rename = "games.room.joined")]
    RoomJoined(RoomSessionPayload),

    /// Game dealt, sent to the host.
    #[serde(rename = "games.session.started")]
    SessionStarted(RoomSessionPayload),

    /// Draw accepted.
    #[serde(rename = "games.session.drawn")]
    Drawn(ActorAck),

    /// Skip/Attack accepted.
    #[serde(rename = "games.session.action.played")]
    ActionPlayed(ActionPlayedAck),

    /// Combo accepted.
    #[serde(rename = "games.session.cat_combo.played")]
    CatComboPlayed(CatComboAck),

    /// Current session state.
    #[serde(rename = "games.session.snapshot")]
    Snapshot(SnapshotPayload),

    /// Room status changed.
    #[serde(rename = "games.room.updated")]
    RoomUpdated(RoomPayload),

    /// Request rejected, sent to the caller only.
    #[serde(rename = "games.exception")]
    Exception(ServerError),

    /// Keepalive reply.
    #[serde(rename = "games.pong")]
    Pong(PongPayload),

    /// Server is shutting down.
    #[serde(rename = "games.shutdown")]
    Shutdown(ShutdownPayload),
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Build an exception for a rejected event.
    pub fn exception(event: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Exception(ServerError {
            event: event.into(),
            code,
            message: message.into(),
        })
    }
}

/// Room plus its session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSessionPayload {
    /// Room.
    pub room: GameRoom,
    /// Session, `None` before the host starts.
    pub session: Option<GameSession>,
}

/// Acknowledgement naming the actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorAck {
    /// Room id.
    pub room_id: String,
    /// User id.
    pub user_id: String,
}

/// Acknowledgement of a Skip/Attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlayedAck {
    /// Room id.
    pub room_id: String,
    /// User id.
    pub user_id: String,
    /// Card played.
    pub card: Card,
}

/// Acknowledgement of a cat combo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatComboAck {
    /// Room id.
    pub room_id: String,
    /// User id.
    pub user_id: String,
    /// Cat played.
    pub cat: Card,
    /// Pair or trio.
    pub mode: ComboMode,
    /// Target user.
    pub target_player_id: String,
    /// Requested card for a trio.
    pub desired_card: Option<Card>,
}

/// Session broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    /// Room id.
    pub room_id: String,
    /// Session, `None` if the room has none yet.
    pub session: Option<GameSession>,
}

/// Room broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomPayload {
    /// Room.
    pub room: GameRoom,
}

/// Keepalive reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PongPayload {
    /// Echoed client timestamp.
    pub timestamp: u64,
    /// Server time in unix milliseconds.
    pub server_time: u64,
}

/// Shutdown notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownPayload {
    /// Reason shown to players.
    pub reason: String,
}

/// Error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Event that was rejected.
    pub event: String,
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Frame could not be parsed or a field is missing/unknown.
    InvalidInput,
    /// Request breaks a game rule or precondition.
    Validation,
    /// Caller may not do this.
    Forbidden,
    /// Room or session does not exist.
    NotFound,
    /// Concurrent write won.
    Conflict,
    /// Internal server error.
    InternalError,
}

impl From<&SessionError> for ErrorCode {
    fn from(err: &SessionError) -> Self {
        match err {
            SessionError::Validation(_) => ErrorCode::Validation,
            SessionError::Forbidden(_) => ErrorCode::Forbidden,
            SessionError::NotFound(_) => ErrorCode::NotFound,
            SessionError::Conflict(_) => ErrorCode::Conflict,
            SessionError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inbound_frame() {
        let json = r#"{"event":"games.session.play_action","data":{"roomId":" r1 ","userId":"u1","card":" SKIP "}}"#;
        let msg = ClientMessage::from_json(json).unwrap();
        assert_eq!(msg.event_name(), "games.session.play_action");

        let ClientMessage::PlayAction(req) = msg else {
            panic!("Wrong message type");
        };
        let cmd = req.validate().unwrap();
        assert_eq!(cmd.room_id, "r1");
        assert_eq!(cmd.card, Card::Skip);
    }

    #[test]
    fn test_missing_fields_reported() {
        let req = DrawRequest { room_id: Some("r1".into()), user_id: Some("   ".into()) };
        assert_eq!(req.validate(), Err(ProtocolError::MissingField("userId")));

        let msg = ClientMessage::from_json(r#"{"event":"games.session.draw","data":{}}"#).unwrap();
        let ClientMessage::Draw(req) = msg else {
            panic!("Wrong message type");
        };
        assert_eq!(req.validate(), Err(ProtocolError::MissingField("roomId")));
    }

    #[test]
    fn test_play_action_rejects_other_cards() {
        let req = PlayActionRequest {
            room_id: Some("r1".into()),
            user_id: Some("u1".into()),
            card: Some("defuse".into()),
        };
        assert_eq!(
            req.validate(),
            Err(ProtocolError::InvalidValue { field: "card", value: "defuse".into() })
        );

        let req = PlayActionRequest { card: Some("banana".into()), ..req };
        assert!(matches!(req.validate(), Err(ProtocolError::InvalidValue { field: "card", .. })));
    }

    #[test]
    fn test_cat_combo_validation() {
        let base = PlayCatComboRequest {
            room_id: Some("r1".into()),
            user_id: Some("u1".into()),
            cat: Some("Tacocat".into()),
            mode: Some(" TRIO ".into()),
            target_player_id: Some("u2".into()),
            desired_card: None,
        };
        assert_eq!(base.validate(), Err(ProtocolError::MissingField("desiredCard")));

        let trio = PlayCatComboRequest { desired_card: Some("defuse".into()), ..base.clone() };
        let cmd = trio.validate().unwrap();
        assert_eq!(cmd.mode, ComboMode::Trio);
        assert_eq!(cmd.cat, Card::Tacocat);
        assert_eq!(cmd.desired_card, Some(Card::Defuse));

        let pair = PlayCatComboRequest {
            mode: Some("pair".into()),
            desired_card: Some("defuse".into()),
            ..base.clone()
        };
        assert_eq!(pair.validate().unwrap().desired_card, None);

        let bad_cat = PlayCatComboRequest { cat: Some("attack".into()), ..base.clone() };
        assert!(matches!(bad_cat.validate(), Err(ProtocolError::InvalidValue { field: "cat", .. })));

        let bad_mode = PlayCatComboRequest { mode: Some("quad".into()), ..base };
        assert_eq!(
            bad_mode.validate(),
            Err(ProtocolError::InvalidValue { field: "mode", value: "quad".into() })
        );
    }

    #[test]
    fn test_start_engine_override() {
        let req = StartRequest {
            room_id: Some("r1".into()),
            user_id: Some("host".into()),
            engine: Some("Exploding_Cats_V1".into()),
        };
        assert_eq!(req.validate().unwrap().engine, Some(Engine::ExplodingCatsV1));

        let req = StartRequest { engine: Some("uno".into()), ..req };
        assert!(matches!(req.validate(), Err(ProtocolError::InvalidValue { field: "engine", .. })));
    }

    #[test]
    fn test_outbound_frame_shape() {
        let msg = ServerMessage::exception("games.session.draw", ErrorCode::Forbidden, "It is not your turn");
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["event"], "games.exception");
        assert_eq!(json["data"]["event"], "games.session.draw");
        assert_eq!(json["data"]["code"], "forbidden");

        let ack = ServerMessage::ActionPlayed(ActionPlayedAck {
            room_id: "r1".into(),
            user_id: "u1".into(),
            card: Card::Attack,
        });
        let json: serde_json::Value = serde_json::from_str(&ack.to_json().unwrap()).unwrap();
        assert_eq!(json["event"], "games.session.action.played");
        assert_eq!(json["data"]["roomId"], "r1");
        assert_eq!(json["data"]["card"], "attack");
    }

    #[test]
    fn test_peek_event() {
        assert_eq!(peek_event(r#"{"event":"games.nope","data":{}}"#), "games.nope");
        assert_eq!(peek_event("not json"), "unknown");
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(ErrorCode::from(&SessionError::Conflict("x".into())), ErrorCode::Conflict);
        assert_eq!(ErrorCode::from(&SessionError::Forbidden("x".into())), ErrorCode::Forbidden);
    }
}
