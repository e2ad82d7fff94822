//! Pending approvals and the approve/reject resumption protocol
//!
//! A suspension cycle moves through
//! `NONE -> PENDING -> RESOLVING -> RESUMED`:
//!
//! - the interpreter surfaces an [`ApprovalRequest`] and the gateway inserts it
//!   into [`PendingApprovals`] (PENDING)
//! - [`ApprovalResolver::resolve`] checks the id and builds the
//!   [`ResumptionPayload`] (RESOLVING)
//! - once the backend accepts the payload the record is removed with
//!   [`PendingApprovals::complete`] (RESUMED); if the backend call fails,
//!   [`PendingApprovals::abort`] puts it back to PENDING
//!
//! The backend's continuation may surface another request, which starts a new
//! cycle with its own id. Chains are unbounded.

use chrono::{DateTime, Utc};
use hitl_backend::FunctionResponse;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A suspended backend action waiting on a human decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    /// The id the resumption must echo back
    pub tool_call_id: String,
    /// Short label, e.g. "send email"
    pub action: String,
    /// Free text describing the action
    pub details: String,
    /// Message to render to the human
    pub human_prompt: String,
    /// Ticket id embedded in the payload by the approval tool, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
}

/// The human's verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn from_approved(approved: bool) -> Self {
        if approved {
            Decision::Approve
        } else {
            Decision::Reject
        }
    }

    /// Status string the backend expects
    pub fn status(&self) -> &'static str {
        match self {
            Decision::Approve => "approved",
            Decision::Reject => "rejected",
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Decision::Approve)
    }
}

/// Approval decision as posted by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDecision {
    pub tool_call_id: String,
    pub approved: bool,
    /// Echo of the action the client was shown
    #[serde(default)]
    pub action: Option<String>,
    /// Echo of the details the client was shown
    #[serde(default)]
    pub details: Option<String>,
}

impl ApprovalDecision {
    pub fn new(tool_call_id: impl Into<String>, approved: bool) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            approved,
            action: None,
            details: None,
        }
    }

    pub fn decision(&self) -> Decision {
        Decision::from_approved(self.approved)
    }
}

/// Message sent back to the backend to unblock a suspended call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumptionPayload {
    pub tool_call_id: String,
    /// Name of the suspended function
    pub function_name: String,
    pub decision: Decision,
    pub action: String,
    pub details: String,
    /// The human request this approval belongs to
    pub original_request: String,
}

impl ResumptionPayload {
    /// The function-response envelope the backend expects
    pub fn to_function_response(&self) -> FunctionResponse {
        FunctionResponse {
            id: Some(self.tool_call_id.clone()),
            name: self.function_name.clone(),
            response: serde_json::json!({
                "status": self.decision.status(),
                "action": self.action,
                "details": self.details,
                "approved": self.decision.is_approved(),
                "original_request": self.original_request,
            }),
        }
    }
}

/// Where a pending record is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingState {
    Pending,
    Resolving,
}

/// A surfaced approval plus the context needed to resume it
#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub request: ApprovalRequest,
    pub original_request: String,
    pub state: PendingState,
    pub surfaced_at: DateTime<Utc>,
}

/// Approvals awaiting a decision, scoped to one conversation.
///
/// At most one live record per tool call id; kept in the order surfaced.
#[derive(Debug, Default)]
pub struct PendingApprovals {
    entries: Vec<PendingApproval>,
}

impl PendingApprovals {
    /// Record a newly surfaced request. Returns `false` (and leaves the
    /// existing record alone) if the id is already live.
    pub fn insert(&mut self, request: ApprovalRequest, original_request: impl Into<String>) -> bool {
        if self.contains(&request.tool_call_id) {
            tracing::warn!(
                tool_call_id = %request.tool_call_id,
                "Approval already pending, ignoring re-surfaced request"
            );
            return false;
        }
        self.entries.push(PendingApproval {
            request,
            original_request: original_request.into(),
            state: PendingState::Pending,
            surfaced_at: Utc::now(),
        });
        true
    }

    pub fn get(&self, tool_call_id: &str) -> Option<&PendingApproval> {
        self.entries
            .iter()
            .find(|e| e.request.tool_call_id == tool_call_id)
    }

    pub fn contains(&self, tool_call_id: &str) -> bool {
        self.get(tool_call_id).is_some()
    }

    /// Move a pending record to RESOLVING.
    pub fn begin_resolution(&mut self, tool_call_id: &str) -> Result<&PendingApproval> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.request.tool_call_id == tool_call_id)
            .ok_or_else(|| Error::UnknownApproval(tool_call_id.to_string()))?;

        if entry.state == PendingState::Resolving {
            return Err(Error::ApprovalInFlight(tool_call_id.to_string()));
        }
        entry.state = PendingState::Resolving;
        Ok(entry)
    }

    /// The backend accepted the resumption: consume the record.
    pub fn complete(&mut self, tool_call_id: &str) -> Option<PendingApproval> {
        let index = self
            .entries
            .iter()
            .position(|e| e.request.tool_call_id == tool_call_id)?;
        Some(self.entries.remove(index))
    }

    /// The resumption did not reach the backend: make the record resolvable again.
    pub fn abort(&mut self, tool_call_id: &str) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.request.tool_call_id == tool_call_id)
        {
            entry.state = PendingState::Pending;
        }
    }

    /// Ids in the order they were surfaced
    pub fn ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.request.tool_call_id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Builds resumption payloads for the configured approval function
#[derive(Debug, Clone)]
pub struct ApprovalResolver {
    function_name: String,
}

impl ApprovalResolver {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
        }
    }

    /// Check the decision against the pending set and build its payload.
    ///
    /// Fails with [`Error::UnknownApproval`] for ids that were never issued or
    /// are already consumed. On success the record is left in RESOLVING; the
    /// caller completes or aborts it once the backend has answered.
    pub fn resolve(
        &self,
        pending: &mut PendingApprovals,
        decision: &ApprovalDecision,
    ) -> Result<ResumptionPayload> {
        let entry = pending.begin_resolution(&decision.tool_call_id)?;

        if let Some(echoed) = decision.action.as_deref() {
            if echoed != entry.request.action {
                tracing::warn!(
                    tool_call_id = %decision.tool_call_id,
                    echoed,
                    recorded = %entry.request.action,
                    "Client echoed a different action, using the recorded one"
                );
            }
        }
        if let Some(echoed) = decision.details.as_deref() {
            if echoed != entry.request.details {
                tracing::warn!(
                    tool_call_id = %decision.tool_call_id,
                    "Client echoed different details, using the recorded ones"
                );
            }
        }

        Ok(self.build(&entry.request, decision.decision(), &entry.original_request))
    }

    /// Pure payload construction from a request and a verdict
    pub fn build(
        &self,
        request: &ApprovalRequest,
        decision: Decision,
        original_request: &str,
    ) -> ResumptionPayload {
        ResumptionPayload {
            tool_call_id: request.tool_call_id.clone(),
            function_name: self.function_name.clone(),
            decision,
            action: request.action.clone(),
            details: request.details.clone(),
            original_request: original_request.to_string(),
        }
    }
}
