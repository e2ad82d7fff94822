//! Pause/resume bookkeeping for long-running backend tools

use hitl_backend::{BackendEvent, Part};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Which leg of a suspension cycle a backend call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    InitialRequest,
    ResumeAfterApproval,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::InitialRequest => f.write_str("initial_request"),
            Phase::ResumeAfterApproval => f.write_str("resume_after_approval"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentStatus {
    Paused,
    Active,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Paused => "PAUSED",
            AgentStatus::Active => "ACTIVE",
        }
    }
}

/// Snapshot of a conversation's long-running tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleStatus {
    pub pending_count: usize,
    pub completed_count: usize,
    pub pending_tools: Vec<String>,
    pub agent_status: AgentStatus,
}

#[derive(Debug, Clone)]
struct PausedTool {
    id: String,
    started_at: Instant,
}

/// Tracks which approvals have the backend paused, and for how long.
///
/// Only ids registered through [`SuspensionTracker::mark_paused`] count as
/// paused, so the tracker never names a tool the client cannot resolve.
/// [`SuspensionTracker::observe`] logs each batch and completes resolved tools.
#[derive(Debug)]
pub struct SuspensionTracker {
    approval_function: String,
    paused: Vec<PausedTool>,
    completed: HashSet<String>,
}

impl SuspensionTracker {
    pub fn new(approval_function: impl Into<String>) -> Self {
        Self {
            approval_function: approval_function.into(),
            paused: Vec::new(),
            completed: HashSet::new(),
        }
    }

    /// Inspect one batch in backend order
    pub fn observe(&mut self, events: &[BackendEvent]) {
        for event in events {
            for id in &event.long_running_tool_ids {
                if !self.is_tracked(id) {
                    tracing::debug!(tool_id = %id, "Long-running tool not awaiting a decision");
                }
            }

            for part in event.parts() {
                match part {
                    Part::FunctionResponse { function_response } => {
                        let Some(id) = function_response.id.as_deref() else {
                            continue;
                        };
                        match function_response.status() {
                            Some("pending") if self.is_tracked(id) => {
                                let action = function_response
                                    .response
                                    .get("action")
                                    .and_then(|a| a.as_str())
                                    .unwrap_or("unknown");
                                tracing::info!(tool_id = id, action, "Agent waiting");
                            }
                            Some(status @ ("approved" | "rejected")) => {
                                self.finish(id, status);
                            }
                            _ => {}
                        }
                    }
                    Part::FunctionCall { function_call }
                        if function_call.name != self.approval_function =>
                    {
                        tracing::info!(
                            function = %function_call.name,
                            id = ?function_call.id,
                            "Agent executing"
                        );
                    }
                    _ => {}
                }
            }
        }
    }

    /// Record a pause. No-op if the tool is already paused.
    pub fn mark_paused(&mut self, id: &str) {
        if self.is_tracked(id) {
            return;
        }
        tracing::info!(tool_id = id, "Agent paused");
        self.paused.push(PausedTool {
            id: id.to_string(),
            started_at: Instant::now(),
        });
    }

    /// Record that a resumption for `id` was accepted by the backend
    pub fn mark_resumed(&mut self, id: &str, status: &str) -> Option<Duration> {
        self.finish(id, status)
    }

    fn finish(&mut self, id: &str, status: &str) -> Option<Duration> {
        let index = self.paused.iter().position(|t| t.id == id)?;
        let tool = self.paused.remove(index);
        let elapsed = tool.started_at.elapsed();
        self.completed.insert(tool.id);
        tracing::info!(
            tool_id = id,
            status,
            duration_secs = elapsed.as_secs_f64(),
            "Agent resumed"
        );
        Some(elapsed)
    }

    /// Forget every paused tool, e.g. when its session is gone
    pub fn clear(&mut self) {
        if !self.paused.is_empty() {
            tracing::debug!(dropped = self.paused.len(), "Clearing paused tools");
        }
        self.paused.clear();
    }

    fn is_tracked(&self, id: &str) -> bool {
        self.paused.iter().any(|t| t.id == id)
    }

    pub fn is_paused(&self) -> bool {
        !self.paused.is_empty()
    }

    pub fn status(&self) -> LifecycleStatus {
        LifecycleStatus {
            pending_count: self.paused.len(),
            completed_count: self.completed.len(),
            pending_tools: self.paused.iter().map(|t| t.id.clone()).collect(),
            agent_status: if self.is_paused() {
                AgentStatus::Paused
            } else {
                AgentStatus::Active
            },
        }
    }
}
