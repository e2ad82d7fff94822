//! Client-facing stream frames

use serde::{Deserialize, Serialize};

/// One unit of the newline-delimited output stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Frame {
    /// Incremental text fragment
    Text { content: String },

    /// A pending approval the client should render
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: ToolCallArgs,
        result: ToolCallResult,
    },

    /// The turn is complete
    Done {
        session_id: String,
        conversation_id: String,
    },

    /// The turn failed; nothing follows
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallArgs {
    pub action: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub action: String,
    pub details: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    /// The human request that led to this approval
    pub original_message: String,
}

impl Frame {
    pub fn text(content: impl Into<String>) -> Self {
        Frame::Text {
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Frame::Error {
            message: message.into(),
        }
    }

    /// Serialise as one NDJSON line, trailing newline included
    pub fn to_line(&self) -> String {
        // Frames hold only strings; encoding does not fail in practice
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","message":"frame encoding failed"}"#.to_string()
        });
        line.push('\n');
        line
    }

    /// Whether the client should treat this as the end of the turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, Frame::Done { .. } | Frame::Error { .. })
    }
}
