//! Solver WebSocket: push channel from the relay to connected solve
//! surfaces. Notices flow one way; client text is ignored, pings are
//! answered, and a lagged subscriber just skips the notices it missed.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, instrument, warn};

use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "relay_backend", "Solver WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "relay_backend", "Solver connected");
  let mut notices = state.subscribe_notices();

  loop {
    tokio::select! {
      notice = notices.recv() => {
        match notice {
          Ok(notice) => {
            let out = match serde_json::to_string(&notice) {
              Ok(out) => out,
              Err(e) => {
                error!(target: "relay_backend", error = %e, "Notice serialization failed");
                continue;
              }
            };
            if let Err(e) = socket.send(Message::Text(out)).await {
              error!(target: "relay_backend", error = %e, "WS send error");
              break;
            }
          }
          Err(RecvError::Lagged(skipped)) => {
            warn!(target: "relay_backend", skipped, "Solver connection lagged; notices dropped");
          }
          Err(RecvError::Closed) => break,
        }
      }
      incoming = socket.recv() => {
        match incoming {
          Some(Ok(Message::Ping(payload))) => {
            let _ = socket.send(Message::Pong(payload)).await;
          }
          Some(Ok(Message::Close(_))) | None => break,
          Some(Ok(_)) => {} // client text/binary is ignored
          Some(Err(e)) => {
            error!(target: "relay_backend", error = %e, "WS receive error");
            break;
          }
        }
      }
    }
  }

  info!(target: "relay_backend", "Solver disconnected");
}
