//! WebSocket upgrade handler for world bridges

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::{AppState, BridgeSession};
use crate::http::middleware::{verify_jwt, AuthError, ROLE_BRIDGE};
use crate::util::rate_limit::BridgeRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{HostCommand, HostEvent};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT token for authentication
    pub token: String,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    // Verify JWT token before upgrading
    let claims = match verify_jwt(&query.token, &state.config.auth_jwt_secret) {
        Ok(claims) if claims.has_role(ROLE_BRIDGE) => claims,
        Ok(claims) => {
            warn!(bridge = %claims.sub, "Token without bridge role");
            return AuthError::Forbidden(ROLE_BRIDGE).into_response();
        }
        Err(e) => {
            error!(error = %e, "WebSocket auth failed");
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };

    info!(bridge = %claims.sub, "WebSocket upgrade for bridge");
    ws.on_upgrade(move |socket| handle_socket(socket, claims.sub, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, name: String, state: AppState) {
    let connection_id = Uuid::new_v4();
    info!(bridge = %name, %connection_id, "Bridge connected");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before the welcome so nothing sent after it is missed
    let commands = state.runtime.subscribe();

    let welcome = HostCommand::Welcome {
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(bridge = %name, error = %e, "Failed to send welcome");
        return;
    }

    state.bridges.insert(
        connection_id,
        BridgeSession {
            connection_id,
            name: name.clone(),
            connected_at: Utc::now(),
        },
    );

    run_session(&name, &state, ws_sink, ws_stream, commands).await;

    state.bridges.remove(&connection_id);
    info!(bridge = %name, %connection_id, "Bridge disconnected");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    name: &str,
    state: &AppState,
    ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut commands: broadcast::Receiver<HostCommand>,
) {
    let rate_limiter = BridgeRateLimiter::new();
    let world = state.runtime.world_writes();

    // Errors for malformed events go out through the same writer
    let (reply_tx, mut reply_rx) = tokio::sync::mpsc::channel::<HostCommand>(16);

    // Spawn writer task: runtime commands -> WebSocket
    let writer_name = name.to_string();
    let writer_handle = tokio::spawn(async move {
        let mut ws_sink = ws_sink;
        loop {
            let msg = tokio::select! {
                received = commands.recv() => match received {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            bridge = %writer_name,
                            lagged_count = n,
                            "Bridge lagged, skipping {} commands", n
                        );
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(bridge = %writer_name, "Command channel closed");
                        break;
                    }
                },
                Some(msg) = async { world.lock().await.recv().await } => msg,
                Some(msg) = reply_rx.recv() => msg,
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(bridge = %writer_name, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> runtime
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<HostEvent>(&text) {
                    Ok(event) => {
                        if !rate_limiter.admit(&event) {
                            debug!(
                                bridge = %name,
                                participant = ?event.participant(),
                                "Rate limited bridge event"
                            );
                            continue;
                        }
                        if state.runtime.send_event(event).await.is_err() {
                            debug!(bridge = %name, "Runtime stopped");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(bridge = %name, error = %e, "Failed to parse bridge event");
                        let _ = reply_tx
                            .send(HostCommand::Error {
                                code: "malformed_event".to_string(),
                                message: e.to_string(),
                            })
                            .await;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(bridge = %name, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(bridge = %name, "Bridge initiated close");
                break;
            }
            Err(e) => {
                error!(bridge = %name, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &HostCommand) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
