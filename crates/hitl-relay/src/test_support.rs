//! Scripted in-memory backend for tests

use async_trait::async_trait;
use hitl_backend::{
    AgentBackend, AppIdentity, BackendEvent, EventBatch, Part, RunRequest, SessionId,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::interpreter::DEFAULT_APPROVAL_FUNCTION;

/// Replays queued batches and records every request it sees.
///
/// With nothing queued, `run` answers with an empty batch.
#[derive(Default)]
pub struct MockBackend {
    responses: Mutex<VecDeque<Vec<BackendEvent>>>,
    runs: Mutex<Vec<RunRequest>>,
    session_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    session_failures: Mutex<VecDeque<hitl_backend::Error>>,
    run_failures: Mutex<VecDeque<hitl_backend::Error>>,
    session_delay: Duration,
    run_delay: Duration,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_delay(mut self, delay: Duration) -> Self {
        self.session_delay = delay;
        self
    }

    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = delay;
        self
    }

    pub fn push_response(&self, events: Vec<BackendEvent>) {
        self.responses.lock().push_back(events);
    }

    pub fn fail_next_session(&self, error: hitl_backend::Error) {
        self.session_failures.lock().push_back(error);
    }

    pub fn fail_next_run(&self, error: hitl_backend::Error) {
        self.run_failures.lock().push_back(error);
    }

    pub fn runs(&self) -> Vec<RunRequest> {
        self.runs.lock().clone()
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    /// Highest number of `run` calls that were ever outstanding at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentBackend for MockBackend {
    async fn create_session(&self, _identity: &AppIdentity) -> hitl_backend::Result<SessionId> {
        let n = self.session_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.session_delay.is_zero() {
            tokio::time::sleep(self.session_delay).await;
        }
        if let Some(e) = self.session_failures.lock().pop_front() {
            return Err(e);
        }
        Ok(SessionId::new(format!("sess-{n}")))
    }

    async fn run(&self, request: &RunRequest) -> hitl_backend::Result<EventBatch> {
        self.runs.lock().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.run_delay.is_zero() {
            tokio::time::sleep(self.run_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(e) = self.run_failures.lock().pop_front() {
            return Err(e);
        }
        let events = self.responses.lock().pop_front().unwrap_or_default();
        Ok(EventBatch::new(events))
    }
}

/// An event in which the approval function reports itself suspended
pub fn pending_event(id: &str, action: &str, details: &str) -> BackendEvent {
    BackendEvent {
        long_running_tool_ids: vec![id.to_string()],
        ..BackendEvent::with_parts(vec![
            Part::function_call(
                id,
                DEFAULT_APPROVAL_FUNCTION,
                json!({"action": action, "details": details}),
            ),
            Part::function_response(
                id,
                DEFAULT_APPROVAL_FUNCTION,
                json!({
                    "status": "pending",
                    "action": action,
                    "details": details,
                    "ticket_id": format!("approval-{id}"),
                }),
            ),
        ])
    }
}

pub fn text_event(text: &str) -> BackendEvent {
    BackendEvent::with_parts(vec![Part::text(text)])
}
