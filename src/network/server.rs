//! WebSocket Game Server
//!
//! Accepts WebSocket connections and feeds their text frames to the
//! [`Gateway`]. Each connection gets a reader loop and a writer task joined by
//! an mpsc queue of [`ServerMessage`]s.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::network::gateway::{pong, Gateway};
use crate::network::hub::ConnectionId;
use crate::network::protocol::{ServerMessage, ShutdownPayload};

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),
}

/// Connected client state.
struct ConnectedClient {
    /// Remote address.
    addr: SocketAddr,
    /// Last inbound frame.
    last_activity: Instant,
    /// Tells the reader loop to stop.
    close_tx: mpsc::Sender<()>,
}

type Clients = Arc<RwLock<BTreeMap<ConnectionId, ConnectedClient>>>;

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Message routing.
    gateway: Arc<Gateway>,
    /// Connected clients.
    clients: Clients,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig, gateway: Arc<Gateway>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            gateway,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Run the server until [`GameServer::shutdown`] is called.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Game server listening on {}", self.config.bind_addr);

        let cleanup_clients = self.clients.clone();
        let idle_timeout = self.config.idle_timeout;
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_clients, idle_timeout).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let gateway = self.gateway.clone();
        let capacity = self.config.channel_capacity;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let connection: ConnectionId = Uuid::new_v4();
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(capacity);
            let (close_tx, mut close_rx) = mpsc::channel::<()>(1);

            // Register client
            {
                let mut clients = clients.write().await;
                clients.insert(connection, ConnectedClient {
                    addr,
                    last_activity: Instant::now(),
                    close_tx,
                });
            }

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                Self::touch(&clients, connection).await;
                                gateway.handle_text(connection, &text, &msg_tx).await;
                            }
                            Some(Ok(Message::Binary(_))) => {
                                debug!("Ignoring binary frame from {}", addr);
                            }
                            Some(Ok(Message::Ping(_))) => {
                                Self::touch(&clients, connection).await;
                                let _ = msg_tx.send(pong(0)).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = close_rx.recv() => {
                        debug!("Closing idle client {}", addr);
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown(ShutdownPayload {
                            reason: "Server shutting down".to_string(),
                        })).await;
                        break;
                    }
                }
            }

            // Cleanup. The hub holds sender clones, so leave the rooms first
            // or the writer never sees its queue close.
            gateway.disconnect(connection).await;
            clients.write().await.remove(&connection);

            drop(msg_tx);
            let _ = tokio::time::timeout(Duration::from_secs(1), sender_task).await;

            info!("Client {} cleaned up", addr);
        });
    }

    /// Record inbound activity.
    async fn touch(clients: &Clients, connection: ConnectionId) {
        let mut clients = clients.write().await;
        if let Some(client) = clients.get_mut(&connection) {
            client.last_activity = Instant::now();
        }
    }

    /// Periodically close connections idle for longer than `idle_timeout`.
    async fn run_cleanup_loop(clients: Clients, idle_timeout: Duration) {
        let mut interval = interval(Duration::from_secs(60).min(idle_timeout));

        loop {
            interval.tick().await;

            let now = Instant::now();
            let idle: Vec<_> = {
                let clients = clients.read().await;
                clients
                    .values()
                    .filter(|c| now.duration_since(c.last_activity) > idle_timeout)
                    .map(|c| (c.addr, c.close_tx.clone()))
                    .collect()
            };

            for (addr, close_tx) in idle {
                let _ = close_tx.try_send(());
                info!("Removed idle client {}", addr);
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }
}
