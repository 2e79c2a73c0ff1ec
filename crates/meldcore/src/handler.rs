//! Per-connection handler: handshake, auth, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler. The flow is:
//!   1. Receive Handshake → validate version
//!   2. Resume by reconnect token, or authenticate → get PlayerId
//!   3. Send HandshakeAck → player is connected
//!   4. Loop: receive envelopes → dispatch system messages and actions
//!
//! Outbound traffic is funneled through a single pump task so room
//! actors, the turn clock, and this handler all share one sequence
//! counter per connection.

use std::sync::Arc;
use std::time::Duration;

use meldcore_protocol::{
    ClientEvent, Codec, Envelope, Payload, PlayerId, ServerEvent, SystemMessage,
};
use meldcore_room::{SnapshotStore, WalletService};
use meldcore_session::{Authenticator, SessionError};
use meldcore_transport::{Connection, WebSocketConnection};

use crate::MeldError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// How long a client may stay silent before the connection is dropped.
/// Heartbeats reset this, so only a dead or stuck client trips it.
const CLIENT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// How long the client has to send its handshake after connecting.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Drop guard that marks the player disconnected when the handler
/// exits, starting the session grace period and emptying their chair
/// at the table.
///
/// This ensures cleanup happens even if the handler panics. Since
/// `Drop` is synchronous, we spawn a fire-and-forget task for the
/// async locks.
struct ConnectionGuard<A, W, S>
where
    A: Authenticator,
    W: WalletService,
    S: SnapshotStore,
{
    player_id: PlayerId,
    state: Arc<ServerState<A, W, S>>,
}

impl<A, W, S> Drop for ConnectionGuard<A, W, S>
where
    A: Authenticator,
    W: WalletService,
    S: SnapshotStore,
{
    fn drop(&mut self) {
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let _ = state.sessions.lock().await.disconnect(player_id);
            if let Err(e) = state.rooms.lock().await.disconnect(player_id).await {
                tracing::debug!(%player_id, error = %e, "no seat to mark disconnected");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, W, S>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, W, S>>,
) -> Result<(), MeldError>
where
    A: Authenticator,
    W: WalletService,
    S: SnapshotStore,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: Handshake ---
    let (player_id, reconnect_token, resumed) = perform_handshake(&conn, &state).await?;

    tracing::info!(%conn_id, %player_id, resumed, "player authenticated");

    let _guard = ConnectionGuard { player_id, state: Arc::clone(&state) };

    // --- Step 2: Outbound pump ---
    // Room actors push `ServerEvent`s; the handler pushes
    // `SystemMessage`s. Both become envelopes here, in order.
    let (sys_tx, mut sys_rx) = tokio::sync::mpsc::unbounded_channel::<SystemMessage>();
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<ServerEvent>();
    {
        let conn = Arc::clone(&conn);
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut seq: u64 = 1;
            loop {
                let payload = tokio::select! {
                    Some(msg) = sys_rx.recv() => Payload::System(msg),
                    Some(event) = event_rx.recv() => Payload::Event(event),
                    else => break,
                };
                let envelope = Envelope { seq, timestamp: state.now_millis(), payload };
                seq += 1;
                let bytes = match state.codec.encode(&envelope) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode outbound envelope");
                        continue;
                    }
                };
                if conn.send(&bytes).await.is_err() {
                    break;
                }
            }
        });
    }

    // A resumed player gets their seat re-attached and a private
    // snapshot replayed through the pump.
    if resumed {
        let result = state
            .rooms
            .lock()
            .await
            .reconnect(player_id, event_tx.clone())
            .await;
        match result {
            Ok(room_id) => tracing::info!(%player_id, %room_id, "seat re-attached"),
            Err(e) => tracing::debug!(%player_id, error = %e, "no seat to re-attach"),
        }
    }

    // --- Step 3: Message loop ---
    loop {
        let data = match tokio::time::timeout(CLIENT_IDLE_TIMEOUT, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%player_id, "connection idle, dropping");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "failed to decode envelope");
                continue;
            }
        };

        match envelope.payload {
            Payload::System(msg) => {
                if handle_system_message(&state, player_id, msg, &sys_tx).await {
                    break;
                }
            }
            Payload::Action(event) => {
                handle_action(&state, player_id, event, &reconnect_token, &event_tx).await;
            }
            Payload::Event(_) => {
                tracing::debug!(%player_id, "client sent a server event, ignoring");
            }
        }
    }

    // _guard drops here → disconnect and grace period start.
    Ok(())
}

/// Receives and validates the handshake, resolving the client to a
/// player. Returns `(player, reconnect_token, resumed)`.
///
/// The handshake token does double duty: a token the session layer
/// recognizes resumes that session; anything else is handed to the
/// [`Authenticator`] as a credential.
async fn perform_handshake<A, W, S>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<A, W, S>>,
) -> Result<(PlayerId, String, bool), MeldError>
where
    A: Authenticator,
    W: WalletService,
    S: SnapshotStore,
{
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(MeldError::Protocol(
                meldcore_protocol::ProtocolError::InvalidMessage(
                    "connection closed before handshake".into(),
                ),
            ));
        }
        Ok(Err(e)) => return Err(MeldError::Transport(e)),
        Err(_) => {
            return Err(MeldError::Protocol(
                meldcore_protocol::ProtocolError::InvalidMessage("handshake timed out".into()),
            ));
        }
    };

    let envelope: Envelope = state.codec.decode(&data)?;

    let (version, token) = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version, token }) => (version, token),
        _ => {
            send_system_error(conn, state, 400, "expected Handshake").await?;
            return Err(MeldError::Protocol(
                meldcore_protocol::ProtocolError::InvalidMessage(
                    "first message must be Handshake".into(),
                ),
            ));
        }
    };

    if version != PROTOCOL_VERSION {
        send_system_error(
            conn,
            state,
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(MeldError::Protocol(
            meldcore_protocol::ProtocolError::InvalidMessage("protocol version mismatch".into()),
        ));
    }

    let token_str = token.as_deref().unwrap_or("");

    // Try to resume an existing session first.
    let resume = {
        let mut sessions = state.sessions.lock().await;
        match sessions.reconnect(token_str) {
            Ok(session) => Some((session.player_id, session.reconnect_token.clone())),
            Err(SessionError::InvalidToken) => None,
            Err(e) => {
                send_system_error(conn, state, 410, "session can no longer be resumed").await?;
                return Err(MeldError::Session(e));
            }
        }
    };

    let (player_id, reconnect_token, resumed) = match resume {
        Some((player_id, token)) => (player_id, token, true),
        None => {
            let player_id = match state.auth.authenticate(token_str).await {
                Ok(pid) => pid,
                Err(e) => {
                    send_system_error(conn, state, 401, "unauthorized").await?;
                    return Err(MeldError::Session(e));
                }
            };
            let token = {
                let mut sessions = state.sessions.lock().await;
                match sessions.create(player_id) {
                    Ok(session) => session.reconnect_token.clone(),
                    Err(e) => {
                        send_system_error(conn, state, 409, "already connected").await?;
                        return Err(MeldError::Session(e));
                    }
                }
            };
            (player_id, token, false)
        }
    };

    let ack = Envelope {
        seq: 0,
        timestamp: state.now_millis(),
        payload: Payload::System(SystemMessage::HandshakeAck {
            player_id,
            server_time: state.now_millis(),
        }),
    };
    let bytes = state.codec.encode(&ack)?;
    conn.send(&bytes).await.map_err(MeldError::Transport)?;

    Ok((player_id, reconnect_token, resumed))
}

/// Handles a system message. Returns `true` if the connection should
/// close.
async fn handle_system_message<A, W, S>(
    state: &Arc<ServerState<A, W, S>>,
    player_id: PlayerId,
    msg: SystemMessage,
    sys_tx: &tokio::sync::mpsc::UnboundedSender<SystemMessage>,
) -> bool
where
    A: Authenticator,
    W: WalletService,
    S: SnapshotStore,
{
    match msg {
        SystemMessage::Heartbeat { client_time } => {
            let _ = sys_tx.send(SystemMessage::HeartbeatAck {
                client_time,
                server_time: state.now_millis(),
            });
        }

        SystemMessage::Disconnect { reason } => {
            tracing::info!(%player_id, %reason, "client disconnected");
            return true;
        }

        SystemMessage::Handshake { .. } => {
            let _ = sys_tx.send(SystemMessage::Error {
                code: 400,
                message: "handshake already completed".into(),
            });
        }

        _ => {
            tracing::debug!(%player_id, "ignoring unexpected system message");
        }
    }

    false
}

/// Routes a game action. Join and leave go through the manager, which
/// owns the player→room index; everything else is forwarded to the
/// player's room actor. Rejections become `Error` events.
async fn handle_action<A, W, S>(
    state: &Arc<ServerState<A, W, S>>,
    player_id: PlayerId,
    event: ClientEvent,
    reconnect_token: &str,
    event_tx: &meldcore_room::PlayerSender,
)
where
    A: Authenticator,
    W: WalletService,
    S: SnapshotStore,
{
    let result = match event {
        ClientEvent::JoinRoom { request } => {
            let joined = state
                .rooms
                .lock()
                .await
                .join_or_create(player_id, request, event_tx.clone())
                .await;
            match joined {
                Ok(room_id) => {
                    let _ = event_tx.send(ServerEvent::RoomJoined {
                        room_id,
                        player_id,
                        reconnect_token: reconnect_token.to_string(),
                    });
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        ClientEvent::LeaveRoom => state.rooms.lock().await.leave_room(player_id).await,
        other => state.rooms.lock().await.route_action(player_id, other).await,
    };

    if let Err(e) = result {
        tracing::debug!(%player_id, error = %e, "action rejected");
        let _ = event_tx.send(ServerEvent::Error { code: e.code(), message: e.to_string() });
    }
}

/// Sends a `SystemMessage::Error` envelope directly, outside the pump.
/// Only used during the handshake, before the pump exists.
async fn send_system_error<A, W, S>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<A, W, S>>,
    code: u16,
    message: &str,
) -> Result<(), MeldError>
where
    A: Authenticator,
    W: WalletService,
    S: SnapshotStore,
{
    let envelope = Envelope {
        seq: 0,
        timestamp: state.now_millis(),
        payload: Payload::System(SystemMessage::Error { code, message: message.to_string() }),
    };
    let bytes = state.codec.encode(&envelope)?;
    conn.send(&bytes).await.map_err(MeldError::Transport)?;
    Ok(())
}
