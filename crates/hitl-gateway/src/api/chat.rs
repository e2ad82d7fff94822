use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use hitl_relay::{AgentStatus, ApprovalDecision, ConversationId, TurnOutcome};
use serde::Deserialize;
use std::convert::Infallible;

use super::error_response;
use crate::server::state::AppState;

pub const CONVERSATION_ID: HeaderName = HeaderName::from_static("x-conversation-id");
pub const AGENT_STATUS: HeaderName = HeaderName::from_static("x-agent-status");
pub const PENDING_TOOLS: HeaderName = HeaderName::from_static("x-pending-tools");

const NDJSON: &str = "application/x-ndjson";

/// A chat turn. Either `message`, or a client transcript whose last user entry is the turn.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub messages: Vec<ClientMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatRequest {
    fn turn_text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or_else(|| {
                self.messages
                    .iter()
                    .rev()
                    .find(|m| m.role == "user")
                    .map(|m| m.content.as_str())
            })
            .filter(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalBody {
    pub conversation_id: String,
    #[serde(flatten)]
    pub decision: ApprovalDecision,
}

/// POST /api/chat - Run a human turn and stream the reply as NDJSON.
pub async fn handler(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    let Some(text) = request.turn_text() else {
        return error_response(StatusCode::BAD_REQUEST, "Request has no user message");
    };
    let id = match request.conversation_id.as_deref() {
        None | Some("") => ConversationId::generate(),
        Some(raw) => match parse_conversation_id(raw) {
            Ok(id) => id,
            Err(response) => return response,
        },
    };

    let result = state.gateway.submit_turn(&id, text).await;
    stream_response(&state, &id, result)
}

/// POST /api/chat/approval - Approve or reject a pending action and stream the resumed turn.
pub async fn approval_handler(
    State(state): State<AppState>,
    Json(body): Json<ApprovalBody>,
) -> Response {
    let id = match parse_conversation_id(&body.conversation_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let result = state.gateway.resolve_approval(&id, body.decision).await;
    stream_response(&state, &id, result)
}

/// Conversation ids are echoed in a response header, so they must be header-safe
fn parse_conversation_id(raw: &str) -> Result<ConversationId, Response> {
    if raw.is_empty() || raw.len() > 128 || HeaderValue::from_str(raw).is_err() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "conversationId must be 1-128 visible ASCII characters",
        ));
    }
    Ok(ConversationId::new(raw))
}

fn stream_response(
    state: &AppState,
    id: &ConversationId,
    result: hitl_relay::Result<TurnOutcome>,
) -> Response {
    let frames = state.gateway.respond(id, result);

    let (agent_status, pending_tools) = match state.gateway.lifecycle_status(id) {
        Some(lifecycle) => (lifecycle.agent_status, lifecycle.pending_tools.join(",")),
        None => (AgentStatus::Active, String::new()),
    };

    let body = Body::from_stream(frames.map(|frame| Ok::<_, Infallible>(frame.to_line())));

    (
        [
            (header::CONTENT_TYPE, NDJSON.to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
            (CONVERSATION_ID, id.to_string()),
            (AGENT_STATUS, agent_status.as_str().to_string()),
            (PENDING_TOOLS, pending_tools),
        ],
        body,
    )
        .into_response()
}
