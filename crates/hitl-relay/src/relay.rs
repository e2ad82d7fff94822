//! Streaming relay: turns an interpreted turn into an ordered frame stream
//!
//! Frame order is always `text* tool_call? done`. The backend call has already
//! completed by the time a stream is built, so the only thing a cancelled or
//! dropped stream abandons is the artificial inter-word delay.

use futures::Stream;
use hitl_backend::SessionId;
use std::pin::Pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::approval::ApprovalRequest;
use crate::conversation::ConversationId;
use crate::frames::{Frame, ToolCallArgs, ToolCallResult};

/// Stream of frames for one turn
pub type FrameStream = Pin<Box<dyn Stream<Item = Frame> + Send>>;

pub const DEFAULT_WORD_DELAY: Duration = Duration::from_millis(50);

/// Tool name shown to clients on approval frames
pub const DEFAULT_TOOL_NAME: &str = "request_approval";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Pause between text fragments; zero disables pacing
    pub word_delay: Duration,
    pub tool_name: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            word_delay: DEFAULT_WORD_DELAY,
            tool_name: DEFAULT_TOOL_NAME.to_string(),
        }
    }
}

/// Everything the relay needs to describe one completed backend round trip
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub conversation_id: ConversationId,
    pub session_id: SessionId,
    pub text: String,
    pub pending_approval: Option<ApprovalRequest>,
    /// The human request the pending approval belongs to
    pub original_request: String,
}

/// Split text into fragments whose concatenation is the original text.
///
/// Each fragment is a word with the whitespace that precedes it; leading
/// whitespace stays on the first word and trailing whitespace on the last.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut prev_ws = true;
    let mut split_at = None;

    for (i, c) in text.char_indices() {
        let ws = c.is_whitespace();
        if ws && !prev_ws {
            split_at = Some(i);
        } else if !ws {
            if let Some(at) = split_at.take() {
                tokens.push(&text[start..at]);
                start = at;
            }
        }
        prev_ws = ws;
    }

    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

/// Build the frame stream for a completed turn
pub fn relay(outcome: TurnOutcome, config: &RelayConfig, cancel: CancellationToken) -> FrameStream {
    let delay = config.word_delay;
    let tool_name = config.tool_name.clone();
    let tokens: Vec<String> = tokenize(&outcome.text)
        .into_iter()
        .map(str::to_string)
        .collect();

    Box::pin(async_stream::stream! {
        for (index, token) in tokens.into_iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                let cancelled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => true,
                    _ = tokio::time::sleep(delay) => false,
                };
                if cancelled {
                    tracing::debug!(conversation_id = %outcome.conversation_id, "Relay cancelled mid-text");
                    return;
                }
            }
            yield Frame::Text { content: token };
        }

        if cancel.is_cancelled() {
            tracing::debug!(conversation_id = %outcome.conversation_id, "Relay cancelled before completion");
            return;
        }

        if let Some(approval) = outcome.pending_approval {
            yield Frame::ToolCall {
                tool_call_id: approval.tool_call_id,
                tool_name,
                args: ToolCallArgs {
                    action: approval.action.clone(),
                    details: approval.details.clone(),
                },
                result: ToolCallResult {
                    action: approval.action,
                    details: approval.details,
                    message: approval.human_prompt,
                    ticket_id: approval.ticket_id,
                    original_message: outcome.original_request,
                },
            };
        }

        yield Frame::Done {
            session_id: outcome.session_id.to_string(),
            conversation_id: outcome.conversation_id.to_string(),
        };
    })
}

/// A stream holding only the terminal error frame
pub fn error_stream(message: impl Into<String>) -> FrameStream {
    Box::pin(futures::stream::iter([Frame::error(message)]))
}
