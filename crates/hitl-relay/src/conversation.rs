//! Conversation state: transcript, pending approvals, and suspension lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{approval::ApprovalRequest, approval::PendingApprovals, lifecycle::SuspensionTracker};

/// Client-side identifier of a logical conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Agent,
}

/// One entry of the transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_invocation: Option<ApprovalRequest>,
    pub timestamp: i64,
}

impl Turn {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
            tool_invocation: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn agent(content: impl Into<String>, tool_invocation: Option<ApprovalRequest>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
            tool_invocation,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Everything the gateway tracks for one conversation.
///
/// Lives behind an async mutex that is held for the whole backend round trip,
/// so turns and resolutions on one conversation never overlap.
pub struct Conversation {
    pub id: ConversationId,
    /// Append-only transcript
    pub turns: Vec<Turn>,
    /// Approvals surfaced to the human and not yet resolved
    pub pending: PendingApprovals,
    /// Pause/resume bookkeeping for long-running tools
    pub tracker: SuspensionTracker,
}

impl Conversation {
    pub fn new(id: ConversationId, approval_function: impl Into<String>) -> Self {
        Self {
            id,
            turns: Vec::new(),
            pending: PendingApprovals::default(),
            tracker: SuspensionTracker::new(approval_function),
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }
}
