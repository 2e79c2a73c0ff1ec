//! `MeldServer` builder and server loop.
//!
//! This is the entry point for running a Meldcore game server. It ties
//! together all the layers: transport → protocol → session → room.

use std::sync::Arc;
use std::time::{Duration, Instant};

use meldcore_protocol::JsonCodec;
use meldcore_room::{RoomManager, SnapshotStore, WalletService};
use meldcore_session::{Authenticator, SessionConfig, SessionManager};
use meldcore_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::MeldError;
use crate::handler::handle_connection;

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
/// Interior mutability via `Mutex` where needed.
pub(crate) struct ServerState<A, W, S>
where
    A: Authenticator,
    W: WalletService,
    S: SnapshotStore,
{
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) rooms: Mutex<RoomManager<W, S>>,
    pub(crate) auth: A,
    pub(crate) codec: JsonCodec,
    /// Server epoch; envelope timestamps are milliseconds since this.
    pub(crate) started: Instant,
}

impl<A, W, S> ServerState<A, W, S>
where
    A: Authenticator,
    W: WalletService,
    S: SnapshotStore,
{
    pub(crate) fn now_millis(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Builder for configuring and starting a Meldcore server.
///
/// # Example
///
/// ```rust,ignore
/// let server = MeldServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(my_auth, wallet, store)
///     .await?;
/// server.run().await
/// ```
pub struct MeldServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    sweep_interval: Duration,
}

impl MeldServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
            sweep_interval: Duration::from_secs(10),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration (reconnection grace period).
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// How often the server expires stale sessions and tears down
    /// finished tables.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Builds the server: binds the listener, recovers any tables the
    /// snapshot store holds, and wires the wallet and authenticator in.
    ///
    /// Uses `JsonCodec` over `WebSocketTransport`.
    pub async fn build<A, W, S>(
        self,
        auth: A,
        wallet: Arc<W>,
        store: Arc<S>,
    ) -> Result<MeldServer<A, W, S>, MeldError>
    where
        A: Authenticator,
        W: WalletService,
        S: SnapshotStore,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let mut rooms = RoomManager::new(wallet, store);
        let recovered = rooms.recover_all().await?;
        if recovered > 0 {
            tracing::info!(recovered, "tables recovered from snapshots");
        }

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new(self.session_config)),
            rooms: Mutex::new(rooms),
            auth,
            codec: JsonCodec,
            started: Instant::now(),
        });

        Ok(MeldServer { transport, state, sweep_interval: self.sweep_interval })
    }
}

impl Default for MeldServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Meldcore game server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct MeldServer<A, W, S>
where
    A: Authenticator,
    W: WalletService,
    S: SnapshotStore,
{
    transport: WebSocketTransport,
    state: Arc<ServerState<A, W, S>>,
    sweep_interval: Duration,
}

impl<A, W, S> MeldServer<A, W, S>
where
    A: Authenticator,
    W: WalletService,
    S: SnapshotStore,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, MeldError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections, performs the handshake, and spawns
    /// a handler task for each connected player. A background task
    /// periodically expires stale sessions and sweeps finished tables.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), MeldError> {
        tracing::info!("Meldcore server running");

        tokio::spawn(maintenance_loop(Arc::clone(&self.state), self.sweep_interval));

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Periodic housekeeping: expired sessions lose their seats, finished
/// tables are torn down.
async fn maintenance_loop<A, W, S>(state: Arc<ServerState<A, W, S>>, interval: Duration)
where
    A: Authenticator,
    W: WalletService,
    S: SnapshotStore,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        // Sessions first, so expired players are out of their rooms
        // before the token data is deleted.
        let expired = {
            let mut sessions = state.sessions.lock().await;
            sessions.expire_stale()
        };

        if !expired.is_empty() {
            let mut rooms = state.rooms.lock().await;
            for player_id in &expired {
                if let Err(e) = rooms.leave_room(*player_id).await {
                    tracing::debug!(%player_id, error = %e, "expired player had no seat");
                }
            }
        }

        {
            let mut sessions = state.sessions.lock().await;
            sessions.cleanup_expired();
        }

        let swept = state.rooms.lock().await.sweep_finished().await;
        if swept > 0 {
            tracing::info!(swept, "finished tables removed");
        }
    }
}
