//! Realtime Gateway
//!
//! Per-connection message handling for the `games` namespace. Each handler
//! validates the payload, calls the session service, and answers the calling
//! connection only. Room-wide snapshots are sent by the hub when the service
//! reports a commit, so handlers never broadcast themselves.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::network::hub::{ConnectionId, RoomHub};
use crate::network::protocol::{
    ActionPlayedAck, ActorAck, CatComboAck, ClientMessage, ErrorCode, PingRequest,
    PlayActionRequest, PlayCatComboRequest, PongPayload, ProtocolError, RoomJoinRequest,
    RoomSessionPayload, ServerMessage, SessionRequest, SnapshotPayload, StartRequest, DrawRequest,
    peek_event,
};
use crate::service::{SessionError, SessionService};

/// Routes client messages to the session service.
pub struct Gateway {
    service: Arc<SessionService>,
    hub: Arc<RoomHub>,
}

impl Gateway {
    /// Create a gateway. `hub` must be the listener registered on `service`
    /// for snapshots to reach room channels.
    pub fn new(service: Arc<SessionService>, hub: Arc<RoomHub>) -> Self {
        Self { service, hub }
    }

    /// Room channels.
    pub fn hub(&self) -> &Arc<RoomHub> {
        &self.hub
    }

    /// Parse and handle a raw text frame.
    pub async fn handle_text(
        &self,
        connection: ConnectionId,
        text: &str,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match ClientMessage::from_json(text) {
            Ok(msg) => self.handle_message(connection, msg, sender).await,
            Err(e) => {
                let event = peek_event(text);
                debug!(%connection, event = %event, error = %e, "Invalid message");
                let _ = sender
                    .send(ServerMessage::exception(
                        event,
                        ErrorCode::InvalidInput,
                        "Invalid message format",
                    ))
                    .await;
            }
        }
    }

    /// Handle a parsed client message.
    pub async fn handle_message(
        &self,
        connection: ConnectionId,
        msg: ClientMessage,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let event = msg.event_name();
        match msg {
            ClientMessage::RoomJoin(req) => {
                self.handle_join(connection, event, req, sender).await;
            }
            ClientMessage::SessionRequest(req) => {
                self.handle_session_request(event, req, sender).await;
            }
            ClientMessage::Draw(req) => {
                self.handle_draw(event, req, sender).await;
            }
            ClientMessage::PlayAction(req) => {
                self.handle_play_action(event, req, sender).await;
            }
            ClientMessage::PlayCatCombo(req) => {
                self.handle_play_cat_combo(event, req, sender).await;
            }
            ClientMessage::Start(req) => {
                self.handle_start(event, req, sender).await;
            }
            ClientMessage::Ping(req) => {
                Self::handle_ping(req, sender).await;
            }
        }
    }

    /// Forget a closed connection.
    pub async fn disconnect(&self, connection: ConnectionId) {
        let rooms = self.hub.remove_connection(connection).await;
        debug!(%connection, rooms, "Connection removed from room channels");
    }

    /// Handle `games.room.join`.
    async fn handle_join(
        &self,
        connection: ConnectionId,
        event: &'static str,
        req: RoomJoinRequest,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let cmd = match req.validate() {
            Ok(cmd) => cmd,
            Err(e) => return reject_protocol(sender, event, e).await,
        };

        let room = match self.service.get_room(&cmd.room_id).await {
            Ok(room) => room,
            Err(e) => return reject(sender, event, e).await,
        };
        if !room.is_participant(&cmd.user_id) {
            return reject(
                sender,
                event,
                SessionError::Forbidden("You are not a member of this room".to_string()),
            )
            .await;
        }

        let session = match self.service.get_session(&room.id).await {
            Ok(session) => session,
            Err(e) => return reject(sender, event, e).await,
        };

        self.hub.join(&room.id, connection, sender.clone()).await;

        info!(room_id = %room.id, user_id = %cmd.user_id, "Player joined room");
        let _ = sender
            .send(ServerMessage::RoomJoined(RoomSessionPayload { room, session }))
            .await;
    }

    /// Handle `games.session.request`.
    async fn handle_session_request(
        &self,
        event: &'static str,
        req: SessionRequest,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let room_id = match req.validate() {
            Ok(room_id) => room_id,
            Err(e) => return reject_protocol(sender, event, e).await,
        };

        match self.service.get_session(&room_id).await {
            Ok(Some(session)) => {
                let _ = sender
                    .send(ServerMessage::Snapshot(SnapshotPayload {
                        room_id,
                        session: Some(session),
                    }))
                    .await;
            }
            Ok(None) => {
                debug!(room_id = %room_id, "Snapshot requested before session start");
            }
            Err(e) => reject(sender, event, e).await,
        }
    }

    /// Handle `games.session.draw`.
    async fn handle_draw(
        &self,
        event: &'static str,
        req: DrawRequest,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let cmd = match req.validate() {
            Ok(cmd) => cmd,
            Err(e) => return reject_protocol(sender, event, e).await,
        };

        match self.service.draw(&cmd.user_id, &cmd.room_id).await {
            Ok(_) => {
                let _ = sender
                    .send(ServerMessage::Drawn(ActorAck {
                        room_id: cmd.room_id,
                        user_id: cmd.user_id,
                    }))
                    .await;
            }
            Err(e) => reject(sender, event, e).await,
        }
    }

    /// Handle `games.session.play_action`.
    async fn handle_play_action(
        &self,
        event: &'static str,
        req: PlayActionRequest,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let cmd = match req.validate() {
            Ok(cmd) => cmd,
            Err(e) => return reject_protocol(sender, event, e).await,
        };

        match self.service.play_action(&cmd.user_id, &cmd.room_id, cmd.card).await {
            Ok(_) => {
                let _ = sender
                    .send(ServerMessage::ActionPlayed(ActionPlayedAck {
                        room_id: cmd.room_id,
                        user_id: cmd.user_id,
                        card: cmd.card,
                    }))
                    .await;
            }
            Err(e) => reject(sender, event, e).await,
        }
    }

    /// Handle `games.session.play_cat_combo`.
    async fn handle_play_cat_combo(
        &self,
        event: &'static str,
        req: PlayCatComboRequest,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let cmd = match req.validate() {
            Ok(cmd) => cmd,
            Err(e) => return reject_protocol(sender, event, e).await,
        };

        let result = self
            .service
            .play_cat_combo(
                &cmd.user_id,
                &cmd.room_id,
                cmd.cat,
                cmd.mode,
                &cmd.target_player_id,
                cmd.desired_card,
            )
            .await;

        match result {
            Ok(_) => {
                let _ = sender
                    .send(ServerMessage::CatComboPlayed(CatComboAck {
                        room_id: cmd.room_id,
                        user_id: cmd.user_id,
                        cat: cmd.cat,
                        mode: cmd.mode,
                        target_player_id: cmd.target_player_id,
                        desired_card: cmd.desired_card,
                    }))
                    .await;
            }
            Err(e) => reject(sender, event, e).await,
        }
    }

    /// Handle `games.session.start`.
    async fn handle_start(
        &self,
        event: &'static str,
        req: StartRequest,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let cmd = match req.validate() {
            Ok(cmd) => cmd,
            Err(e) => return reject_protocol(sender, event, e).await,
        };

        match self.service.start_session(&cmd.user_id, &cmd.room_id, cmd.engine).await {
            Ok((room, session)) => {
                let _ = sender
                    .send(ServerMessage::SessionStarted(RoomSessionPayload {
                        room,
                        session: Some(session),
                    }))
                    .await;
            }
            Err(e) => reject(sender, event, e).await,
        }
    }

    /// Handle `games.ping`.
    async fn handle_ping(req: PingRequest, sender: &mpsc::Sender<ServerMessage>) {
        let _ = sender.send(pong(req.timestamp)).await;
    }
}

/// Keepalive reply stamped with the server clock.
pub fn pong(timestamp: u64) -> ServerMessage {
    ServerMessage::Pong(PongPayload {
        timestamp,
        server_time: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64,
    })
}

async fn reject(sender: &mpsc::Sender<ServerMessage>, event: &str, err: SessionError) {
    let code = ErrorCode::from(&err);
    match code {
        ErrorCode::InternalError | ErrorCode::Conflict => {
            warn!(event, error = %err, "Request rejected");
        }
        _ => debug!(event, error = %err, "Request rejected"),
    }
    let _ = sender.send(ServerMessage::exception(event, code, err.to_string())).await;
}

async fn reject_protocol(sender: &mpsc::Sender<ServerMessage>, event: &str, err: ProtocolError) {
    debug!(event, error = %err, "Malformed payload");
    let _ = sender
        .send(ServerMessage::exception(event, ErrorCode::InvalidInput, err.to_string()))
        .await;
}
