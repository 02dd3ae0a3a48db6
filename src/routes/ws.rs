//! WebSocket upgrade + message loop. Each connection owns one workspace; every
//! text frame is parsed as a client message and answered with one JSON reply.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

use crate::logic::handle_message;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::workspace::Workspace;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "letmecook_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let workspace = Mutex::new(Workspace::new());
  let workspace_id = workspace.lock().await.id().to_string();
  info!(target: "letmecook_backend", %workspace_id, "WebSocket connected");

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "letmecook_backend", %workspace_id, action = incoming.name(), "WS received");
            handle_message(&state, &workspace, incoming).await
          }
          Err(e) => ServerMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "letmecook_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "letmecook_backend", %workspace_id, "WebSocket disconnected");
}
