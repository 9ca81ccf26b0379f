//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{AgentInfoResponse, ChatRequest, ChatResponse, CloseResponse, ErrorResponse};
use super::AppState;
use crate::ipc::HostMessage;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Surface -> host
        .route("/api/chat", post(send_chat))
        .route("/api/close", post(close_window))
        // Host -> surface
        .route("/api/stream", get(stream_events))
        .route("/api/agent", get(agent_info))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Surface -> host
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("Message text is empty".to_string()));
    }

    state
        .requests
        .send(HostMessage::UserMessage(req.text))
        .map_err(|_| AppError::Unavailable("Chat host is closed".to_string()))?;

    Ok(Json(ChatResponse { queued: true }))
}

async fn close_window(State(state): State<AppState>) -> Json<CloseResponse> {
    let ok = state.requests.send(HostMessage::CloseWindow).is_ok();
    if !ok {
        tracing::debug!("Close requested after host already stopped");
    }
    Json(CloseResponse { ok })
}

// ============================================================
// Host -> surface
// ============================================================

async fn stream_events(State(state): State<AppState>) -> impl IntoResponse {
    tracing::info!("Surface subscribed to stream events");
    sse_stream(state.events.subscribe())
}

async fn agent_info(State(state): State<AppState>) -> Json<AgentInfoResponse> {
    Json(AgentInfoResponse {
        name: state.agent_name.to_string(),
    })
}

async fn get_version() -> &'static str {
    concat!("crypto-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
