//! REST endpoints driving a session from a web front end.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::gateway::ImageAttachment;
use crate::session::SessionController;

/// Shared state for session routes.
#[derive(Clone)]
pub struct SessionRouteState {
    pub controller: Arc<SessionController>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub file_name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Base64-encoded file contents.
    pub data: String,
}

/// GET /api/session
async fn get_session(State(state): State<SessionRouteState>) -> impl IntoResponse {
    Json(state.controller.snapshot().await)
}

/// POST /api/session/message
///
/// Waits for any request the message triggers, then returns the snapshot.
async fn post_message(
    State(state): State<SessionRouteState>,
    Json(body): Json<MessageRequest>,
) -> impl IntoResponse {
    state.controller.handle_user_input(&body.text).await;
    Json(state.controller.snapshot().await)
}

/// POST /api/session/image
async fn post_image(
    State(state): State<SessionRouteState>,
    Json(body): Json<ImageRequest>,
) -> impl IntoResponse {
    let bytes = match STANDARD.decode(body.data.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected image upload");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid base64 image data"})),
            )
                .into_response();
        }
    };
    let content_type = body
        .content_type
        .unwrap_or_else(|| ImageAttachment::content_type_for(&body.file_name).to_string());
    let image = ImageAttachment::new(body.file_name, content_type, bytes);
    state.controller.handle_image(image).await;
    Json(state.controller.snapshot().await).into_response()
}

/// POST /api/session/restart
async fn post_restart(State(state): State<SessionRouteState>) -> impl IntoResponse {
    state.controller.restart().await;
    Json(state.controller.snapshot().await)
}

/// POST /api/session/home
async fn post_home(State(state): State<SessionRouteState>) -> impl IntoResponse {
    state.controller.go_home().await;
    Json(state.controller.snapshot().await)
}

/// Build the session REST routes.
pub fn session_routes(state: SessionRouteState) -> Router {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/session/message", post(post_message))
        .route("/api/session/image", post(post_image))
        .route("/api/session/restart", post(post_restart))
        .route("/api/session/home", post(post_home))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
