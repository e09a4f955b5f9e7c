//! Network Layer
//!
//! WebSocket gateway for the `games` namespace. All rule decisions happen in
//! `game/` via the session service; this layer only validates, routes, and
//! fans out.

pub mod protocol;
pub mod hub;
pub mod gateway;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, ErrorCode, ServerError, ProtocolError};
pub use hub::{ConnectionId, RoomHub};
pub use gateway::Gateway;
pub use server::{GameServer, GameServerError};
