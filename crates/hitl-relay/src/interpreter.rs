//! Event interpretation: display text and pending approvals from a backend batch

use hitl_backend::{BackendEvent, FunctionResponse, Part};
use serde::Deserialize;

use crate::approval::ApprovalRequest;

/// Name of the backend's long-running approval function
pub const DEFAULT_APPROVAL_FUNCTION: &str = "request_human_approval";

/// Something off about a batch that was recovered from locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// A second pending approval in one batch; only the first is surfaced
    DuplicatePendingApproval { kept: String, ignored: String },
    /// The pending response had no `id`; the payload's ticket id was used instead
    TicketIdFallback { ticket_id: String },
    /// The pending response had neither an `id` nor a ticket id and cannot be resumed
    MissingApprovalId,
    /// The pending response payload was not the expected object
    UndecodableApprovalPayload { reason: String },
}

/// Result of interpreting one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interpretation {
    /// The last display text in the batch, empty if there was none
    pub text: String,
    /// The first pending approval in the batch
    pub pending_approval: Option<ApprovalRequest>,
    pub anomalies: Vec<Anomaly>,
}

impl Interpretation {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.pending_approval.is_none()
    }
}

/// Payload the approval function returns while suspended
#[derive(Debug, Deserialize)]
struct PendingPayload {
    action: String,
    #[serde(default)]
    details: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "ticketId")]
    ticket_id: Option<String>,
}

/// Walks a batch in backend order and extracts what the client should see
#[derive(Debug, Clone)]
pub struct Interpreter {
    approval_function: String,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(DEFAULT_APPROVAL_FUNCTION)
    }
}

impl Interpreter {
    pub fn new(approval_function: impl Into<String>) -> Self {
        Self {
            approval_function: approval_function.into(),
        }
    }

    pub fn approval_function(&self) -> &str {
        &self.approval_function
    }

    pub fn interpret(&self, events: &[BackendEvent]) -> Interpretation {
        let mut out = Interpretation::default();

        for event in events {
            for part in event.parts() {
                match part {
                    Part::Text { .. } => {
                        // Later text supersedes earlier partials; empty parts carry nothing
                        if let Some(text) = part.as_text().filter(|t| !t.is_empty()) {
                            out.text = text.to_string();
                        }
                    }
                    Part::FunctionResponse { function_response }
                        if function_response.name == self.approval_function =>
                    {
                        self.observe_approval_response(function_response, &mut out);
                    }
                    Part::FunctionCall { .. } | Part::FunctionResponse { .. } => {}
                    Part::Other(value) => {
                        tracing::debug!(part = %value, "Ignoring unrecognised part");
                    }
                }
            }
        }

        for anomaly in &out.anomalies {
            tracing::warn!(?anomaly, "Backend batch anomaly");
        }

        out
    }

    fn observe_approval_response(&self, response: &FunctionResponse, out: &mut Interpretation) {
        match response.status() {
            Some("pending") => {}
            Some("approved") | Some("rejected") => {
                tracing::debug!(id = ?response.id, "Approval already resolved, not re-surfacing");
                return;
            }
            other => {
                tracing::debug!(status = ?other, "Approval response with unrecognised status");
                return;
            }
        }

        let payload = match PendingPayload::deserialize(&response.response) {
            Ok(payload) => payload,
            Err(e) => {
                out.anomalies.push(Anomaly::UndecodableApprovalPayload {
                    reason: e.to_string(),
                });
                return;
            }
        };

        let tool_call_id = match (&response.id, &payload.ticket_id) {
            (Some(id), _) if !id.is_empty() => id.clone(),
            (_, Some(ticket_id)) if !ticket_id.is_empty() => {
                out.anomalies.push(Anomaly::TicketIdFallback {
                    ticket_id: ticket_id.clone(),
                });
                ticket_id.clone()
            }
            _ => {
                out.anomalies.push(Anomaly::MissingApprovalId);
                return;
            }
        };

        if let Some(kept) = &out.pending_approval {
            if kept.tool_call_id != tool_call_id {
                out.anomalies.push(Anomaly::DuplicatePendingApproval {
                    kept: kept.tool_call_id.clone(),
                    ignored: tool_call_id,
                });
            }
            return;
        }

        let human_prompt = payload.message.unwrap_or_else(|| {
            format!(
                "Human approval requested for: {}. Details: {}.",
                payload.action, payload.details
            )
        });

        out.pending_approval = Some(ApprovalRequest {
            tool_call_id,
            action: payload.action,
            details: payload.details,
            human_prompt,
            ticket_id: payload.ticket_id,
        });
    }
}
