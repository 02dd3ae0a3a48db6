//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::domain::ModeKind;
use crate::error::{ActionError, GenerationError};
use crate::grading::classify;
use crate::logic::dispatch;
use crate::parser::{parse, parse_exam};
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, generation: state.generator.is_some() })
}

#[instrument(level = "info", skip(body), fields(kind = ?body.kind, text_len = body.text.len()))]
pub async fn http_post_parse(Json(body): Json<ParseIn>) -> impl IntoResponse {
  let out = match body.kind {
    ParseKind::OpenEnded => ParseOut::Items(parse(&body.text, ModeKind::OpenEnded)),
    ParseKind::Mcq => ParseOut::Items(parse(&body.text, ModeKind::Mcq)),
    ParseKind::Flashcard => ParseOut::Items(parse(&body.text, ModeKind::Flashcard)),
    ParseKind::Exam => ParseOut::Exam(parse_exam(&body.text)),
  };
  let count = match &out {
    ParseOut::Items(items) => items.len(),
    ParseOut::Exam(batch) => batch.open.len() + batch.mcq.len(),
  };
  info!(target: "parser", kind = ?body.kind, count, "HTTP parse served");
  Json(out)
}

#[instrument(level = "info", skip(body), fields(text_len = body.text.len()))]
pub async fn http_post_classify(Json(body): Json<ClassifyIn>) -> impl IntoResponse {
  let verdict = classify(&body.text);
  Json(ClassifyOut { verdict, correct: verdict.is_pass() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_create_workspace(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let (workspace_id, _) = state.create_workspace().await;
  (StatusCode::CREATED, Json(WorkspaceOut { workspace_id }))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_delete_workspace(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> StatusCode {
  if state.remove_workspace(&id).await {
    StatusCode::NO_CONTENT
  } else {
    StatusCode::NOT_FOUND
  }
}

#[instrument(level = "info", skip(state, msg), fields(%id, action = msg.name()))]
pub async fn http_post_action(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(msg): Json<ClientMessage>,
) -> Response {
  let Some(workspace) = state.get_workspace(&id).await else {
    let message = format!("Unknown workspace: {id}");
    return (StatusCode::NOT_FOUND, Json(ServerMessage::Error { message })).into_response();
  };

  match dispatch(&state, &workspace, msg).await {
    Ok(reply) => Json(reply).into_response(),
    Err(e) => {
      let status = status_for(&e);
      info!(target: "session", workspace_id = %id, status = status.as_u16(), error = %e, "HTTP action failed");
      (status, Json(ServerMessage::Error { message: e.to_string() })).into_response()
    }
  }
}

fn status_for(e: &ActionError) -> StatusCode {
  match e {
    ActionError::Validation(_) => StatusCode::BAD_REQUEST,
    ActionError::NothingGenerated(_) => StatusCode::UNPROCESSABLE_ENTITY,
    ActionError::Generation(GenerationError::NotConfigured | GenerationError::InvalidApiKey) => {
      StatusCode::SERVICE_UNAVAILABLE
    }
    ActionError::Generation(_) => StatusCode::BAD_GATEWAY,
  }
}
