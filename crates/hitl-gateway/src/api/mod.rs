pub mod chat;
pub mod conversations;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};

use crate::server::state::AppState;

/// Build the client-facing API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat::handler))
        .route("/chat/approval", post(chat::approval_handler))
        .route(
            "/conversations/:id",
            get(conversations::status_handler).delete(conversations::delete_handler),
        )
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// JSON error body with the given status
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}
