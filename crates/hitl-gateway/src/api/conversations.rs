use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hitl_relay::ConversationId;

use super::error_response;
use crate::server::state::AppState;

/// GET /api/conversations/:id - Transcript, session and pending approvals.
pub async fn status_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state
        .gateway
        .conversation_status(&ConversationId::new(id.as_str()))
        .await
    {
        Some(status) => Json(status).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("conversation '{}' not found", id),
        ),
    }
}

/// DELETE /api/conversations/:id - End a conversation and drop its session binding.
pub async fn delete_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if state.gateway.end_conversation(&ConversationId::new(id.as_str())) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            format!("conversation '{}' not found", id),
        )
    }
}
