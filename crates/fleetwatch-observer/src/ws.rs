//! `WebSocket` handler for live vehicle updates.
//!
//! Clients connect to `GET /ws/vehicles` and receive every
//! [`VehicleUpdate`](fleetwatch_types::VehicleUpdate) as a JSON text
//! frame. Nothing is replayed on connect: the stream starts with the next
//! update.
//!
//! If a client falls behind, lagged messages are skipped and the client
//! resumes from the most recent update.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming vehicle updates.
///
/// # Route
///
/// `GET /ws/vehicles`
pub async fn ws_vehicles(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    let mut rx = state.subscribe();
    info!(%connection_id, channel = state.broadcaster.name(), "live-view client connected");

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(update) => {
                        let json = match serde_json::to_string(&update) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!(%connection_id, "Failed to serialize vehicle update: {e}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            debug!(%connection_id, "send failed");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(%connection_id, skipped = n, "live-view client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!(%connection_id, "broadcast channel closed");
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(%connection_id, "WebSocket error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!(%connection_id, "live-view client disconnected");
}
