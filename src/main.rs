//! Exploding Cats Session Server
//!
//! Serves the `games` WebSocket namespace over in-memory room and session
//! backends.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use exploding_cats::{
    VERSION,
    config::ServerConfig,
    network::{Gateway, GameServer, RoomHub},
    rooms::{GameRoom, InMemoryRoomRegistry},
    service::SessionService,
    store::{InMemorySessionStore, EXPLODING_CATS_GAME_ID},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = ServerConfig::from_env().context("Invalid server configuration")?;

    info!("Exploding Cats Server v{}", VERSION);
    info!("Max connections: {}", config.max_connections);
    info!("Idle timeout: {}s", config.idle_timeout.as_secs());

    let rooms = InMemoryRoomRegistry::new();
    seed_demo_room(&rooms).await;

    let hub = Arc::new(RoomHub::new());
    let service = SessionService::new(Arc::new(rooms), Arc::new(InMemorySessionStore::new()))
        .with_listener(hub.clone());
    let gateway = Arc::new(Gateway::new(Arc::new(service), hub));
    let server = Arc::new(GameServer::new(config, gateway));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received");
            signal_server.shutdown();
        }
    });

    server.run().await.context("Server exited with an error")?;
    info!("Server stopped");
    Ok(())
}

/// Room creation belongs to the platform; seed one lobby so a local client
/// has something to join.
async fn seed_demo_room(rooms: &InMemoryRoomRegistry) {
    let room = GameRoom::new("demo", "alice", EXPLODING_CATS_GAME_ID)
        .with_member("bob")
        .with_member("carol");
    info!("Seeded demo room {} hosted by {}", room.id, room.host_id);
    rooms.insert(room).await;
}
