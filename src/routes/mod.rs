//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (one private workspace per connection)
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/parse", post(http::http_post_parse))
        .route("/api/v1/classify", post(http::http_post_classify))
        .route("/api/v1/workspaces", post(http::http_create_workspace))
        .route("/api/v1/workspaces/:id", axum::routing::delete(http::http_delete_workspace))
        .route("/api/v1/workspaces/:id/actions", post(http::http_post_action))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::StudyConfig;

    fn app() -> (Arc<AppState>, Router) {
        let state = Arc::new(AppState::with_generator(StudyConfig::default(), None));
        (state.clone(), build_router(state))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(v) => builder.header("content-type", "application/json").body(Body::from(v.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_generation_status() {
        let (_, app) = app();
        let (status, body) = call(&app, Method::GET, "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "generation": false }));
    }

    #[tokio::test]
    async fn parse_and_classify_are_stateless() {
        let (_, app) = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/parse",
            Some(json!({ "kind": "open_ended", "text": "Q1: Why?\n---\nQ2: How?\n---" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "open_ended");
        assert_eq!(body["items"][1]["text"], "How?");

        let (_, body) = call(
            &app,
            Method::POST,
            "/api/v1/parse",
            Some(json!({ "kind": "exam", "text": "Q1: Why?\nMCQ1: Pick\nA) x\nB) y\nCORRECT: B\nEXPLANATION: y." })),
        )
        .await;
        assert_eq!(body["open"][0]["text"], "Why?");
        assert_eq!(body["mcq"][0]["correct_letter"], "B");

        let (_, body) =
            call(&app, Method::POST, "/api/v1/classify", Some(json!({ "text": "RESULT: PARTIALLY CORRECT" }))).await;
        assert_eq!(body, json!({ "verdict": "partially_correct", "correct": false }));
    }

    #[tokio::test]
    async fn workspace_lifecycle() {
        let (state, app) = app();
        let (status, body) = call(&app, Method::POST, "/api/v1/workspaces", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["workspaceId"].as_str().unwrap().to_string();
        assert!(state.get_workspace(&id).await.is_some());

        let actions = format!("/api/v1/workspaces/{id}/actions");
        let (status, body) =
            call(&app, Method::POST, &actions, Some(json!({ "type": "set_material", "text": "notes" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "workspace");
        assert_eq!(body["view"]["mode"], "idle");
        assert_eq!(body["view"]["hasMaterial"], true);

        let (status, body) = call(&app, Method::POST, &actions, Some(json!({ "type": "submit_mcq" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "error");

        let (status, _) = call(&app, Method::POST, &actions, Some(json!({ "type": "enter_mode", "mode": "exam" }))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = call(&app, Method::DELETE, &format!("/api/v1/workspaces/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::POST, &actions, Some(json!({ "type": "view" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
