//! LetMeCook · Study Aid Backend
//!
//! - Axum HTTP + WebSocket API over per-learner workspaces
//! - Gemini integration for study guides, exams, flashcards and grading
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   GEMINI_API_KEY        : enables generation if present and well-formed
//!   GEMINI_BASE_URL       : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL          : default "gemini-2.0-flash-exp"
//!   GEMINI_FALLBACK_MODEL : default "gemini-1.5-flash" (used after a 404)
//!   STUDY_CONFIG_PATH     : path to TOML config (prompts, generation, session tuning)
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod parser;
mod session;
mod grading;
mod replenish;
mod gemini;
mod workspace;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (config, Gemini client, workspace store).
  let state = Arc::new(AppState::new());

  // Drop HTTP workspaces that clients abandoned without a DELETE.
  let _sweeper = state::spawn_idle_sweep(state.clone());

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "letmecook_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "letmecook_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "letmecook_backend", error = %e, "Failed to listen for shutdown signal");
  }
}
