//! The gateway: per-conversation orchestration of turns and resolutions
//!
//! ```text
//! submit_turn:      SessionStore -> BackendAdapter -> Interpreter -> TurnOutcome
//! resolve_approval: ApprovalResolver -> BackendAdapter (same session) -> Interpreter -> TurnOutcome
//! ```
//!
//! Each conversation sits behind its own async mutex, held across the backend
//! round trip. Different conversations never share mutable state.
//!
//! Conversations live until [`Gateway::end_conversation`]. The only automatic
//! removal is a conversation whose first session could not be created and
//! that has no turns yet.

use hitl_backend::{AgentBackend, AppIdentity, EventBatch, SessionId};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::adapter::BackendAdapter;
use crate::approval::{ApprovalDecision, ApprovalResolver};
use crate::conversation::{Conversation, ConversationId, Turn};
use crate::error::{Error, Result};
use crate::interpreter::{DEFAULT_APPROVAL_FUNCTION, Interpreter};
use crate::lifecycle::LifecycleStatus;
use crate::relay::{self, FrameStream, RelayConfig, TurnOutcome};
use crate::session::SessionStore;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Name of the backend function that suspends for a human decision
    pub approval_function: String,
    pub relay: RelayConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            approval_function: DEFAULT_APPROVAL_FUNCTION.to_string(),
            relay: RelayConfig::default(),
        }
    }
}

/// Snapshot of a conversation for status queries
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStatus {
    pub conversation_id: ConversationId,
    pub session_id: Option<SessionId>,
    pub turn_count: usize,
    pub pending_approvals: Vec<String>,
    pub lifecycle: LifecycleStatus,
    pub turns: Vec<Turn>,
}

#[derive(Clone)]
struct Entry {
    conversation: Arc<tokio::sync::Mutex<Conversation>>,
    /// Tracker status as of the last completed round trip, readable without
    /// waiting on the conversation lock
    lifecycle: Arc<Mutex<LifecycleStatus>>,
    /// Parent of every relay stream for this conversation
    cancel: CancellationToken,
}

impl Entry {
    fn new(conversation: Conversation) -> Self {
        Self {
            lifecycle: Arc::new(Mutex::new(conversation.tracker.status())),
            conversation: Arc::new(tokio::sync::Mutex::new(conversation)),
            cancel: CancellationToken::new(),
        }
    }

    fn publish(&self, conversation: &Conversation) {
        *self.lifecycle.lock() = conversation.tracker.status();
    }
}

pub struct Gateway {
    adapter: BackendAdapter,
    sessions: SessionStore,
    interpreter: Interpreter,
    resolver: ApprovalResolver,
    config: GatewayConfig,
    conversations: Mutex<HashMap<ConversationId, Entry>>,
}

impl Gateway {
    pub fn new(backend: Arc<dyn AgentBackend>, identity: AppIdentity, config: GatewayConfig) -> Self {
        let adapter = BackendAdapter::new(backend, identity);
        Self {
            sessions: SessionStore::new(adapter.clone()),
            adapter,
            interpreter: Interpreter::new(config.approval_function.clone()),
            resolver: ApprovalResolver::new(config.approval_function.clone()),
            config,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Send a human turn, creating the conversation and its session on first use.
    ///
    /// Nothing is appended to the transcript unless the backend call succeeds.
    pub async fn submit_turn(&self, id: &ConversationId, text: &str) -> Result<TurnOutcome> {
        if text.trim().is_empty() {
            return Err(Error::EmptyMessage);
        }

        let entry = self.entry(id);
        let mut conversation = entry.conversation.lock().await;

        let had_session = self.sessions.get(id).is_some();
        let session_id = match self.sessions.ensure_session(id).await {
            Ok(session_id) => session_id,
            Err(e) => {
                let unused = conversation.turns.is_empty();
                drop(conversation);
                if unused {
                    self.discard_unused(id, &entry);
                }
                return Err(e);
            }
        };
        if !had_session && !conversation.pending.is_empty() {
            // Approvals belonged to the previous session and can no longer be resumed
            tracing::warn!(
                conversation_id = %id,
                stale = ?conversation.pending.ids(),
                "Dropping approvals from a lost session"
            );
            conversation.pending.clear();
            conversation.tracker.clear();
            entry.publish(&conversation);
        }

        tracing::info!(conversation_id = %id, session_id = %session_id, "Submitting turn");
        let batch = self.adapter.send_turn(&session_id, text).await?;

        conversation.push(Turn::human(text));
        let outcome = self.absorb(&mut conversation, session_id, batch, text.to_string());
        entry.publish(&conversation);
        Ok(outcome)
    }

    /// Resume a suspended backend call with the human's decision.
    ///
    /// Unknown ids fail before the backend is contacted. A failed backend call
    /// leaves the approval pending so the human can decide again.
    pub async fn resolve_approval(
        &self,
        id: &ConversationId,
        decision: ApprovalDecision,
    ) -> Result<TurnOutcome> {
        let Some(entry) = self.existing(id) else {
            return Err(Error::UnknownApproval(decision.tool_call_id));
        };
        let mut conversation = entry.conversation.lock().await;

        let payload = self.resolver.resolve(&mut conversation.pending, &decision)?;

        let Some(session_id) = self.sessions.get(id) else {
            conversation.pending.abort(&payload.tool_call_id);
            return Err(Error::SessionLost(id.to_string()));
        };

        tracing::info!(
            conversation_id = %id,
            session_id = %session_id,
            tool_call_id = %payload.tool_call_id,
            decision = payload.decision.status(),
            "Resuming suspended call"
        );

        let batch = match self.adapter.send_resumption(&session_id, &payload).await {
            Ok(batch) => batch,
            Err(e) => {
                conversation.pending.abort(&payload.tool_call_id);
                return Err(e);
            }
        };

        conversation.pending.complete(&payload.tool_call_id);
        conversation
            .tracker
            .mark_resumed(&payload.tool_call_id, payload.decision.status());

        let verdict = if payload.decision.is_approved() {
            "Approved"
        } else {
            "Rejected"
        };
        conversation.push(Turn::human(format!("{verdict}: {}", payload.action)));

        let outcome = self.absorb(
            &mut conversation,
            session_id,
            batch,
            payload.original_request,
        );
        entry.publish(&conversation);
        Ok(outcome)
    }

    /// Run a turn and relay it; failures become a single error frame
    pub async fn stream_turn(&self, id: &ConversationId, text: &str) -> FrameStream {
        let result = self.submit_turn(id, text).await;
        self.respond(id, result)
    }

    /// Resolve an approval and relay the resumed turn
    pub async fn stream_resolution(&self, id: &ConversationId, decision: ApprovalDecision) -> FrameStream {
        let result = self.resolve_approval(id, decision).await;
        self.respond(id, result)
    }

    /// Frame stream for a completed round trip, cancelled if the conversation ends
    pub fn relay(&self, outcome: TurnOutcome) -> FrameStream {
        let cancel = self
            .conversations
            .lock()
            .get(&outcome.conversation_id)
            .map(|entry| entry.cancel.child_token())
            .unwrap_or_default();
        relay::relay(outcome, &self.config.relay, cancel)
    }

    /// Relay a round trip's result; an error becomes the single terminal error frame
    pub fn respond(&self, id: &ConversationId, result: Result<TurnOutcome>) -> FrameStream {
        let error = match result {
            Ok(outcome) => return self.relay(outcome),
            Err(error) => error,
        };
        if error.is_client_error() {
            tracing::debug!(conversation_id = %id, error = %error, "Rejected request");
        } else {
            tracing::warn!(conversation_id = %id, error = %error, "Turn failed");
        }
        relay::error_stream(error.user_message())
    }

    /// Drop a conversation with its pending approvals and session binding.
    ///
    /// Returns whether the conversation existed.
    pub fn end_conversation(&self, id: &ConversationId) -> bool {
        let entry = self.conversations.lock().remove(id);
        self.sessions.forget(id);

        let Some(entry) = entry else {
            return false;
        };
        entry.cancel.cancel();
        if let Ok(mut conversation) = entry.conversation.try_lock() {
            conversation.pending.clear();
        }
        tracing::info!(conversation_id = %id, "Conversation ended");
        true
    }

    /// Drop only the session binding. Pending approvals fail with
    /// [`Error::SessionLost`] until the next turn binds a fresh session.
    pub fn reset_session(&self, id: &ConversationId) -> Option<SessionId> {
        self.sessions.forget(id)
    }

    pub async fn conversation_status(&self, id: &ConversationId) -> Option<ConversationStatus> {
        let entry = self.existing(id)?;
        let conversation = entry.conversation.lock().await;
        Some(ConversationStatus {
            conversation_id: id.clone(),
            session_id: self.sessions.get(id),
            turn_count: conversation.turns.len(),
            pending_approvals: conversation.pending.ids(),
            lifecycle: conversation.tracker.status(),
            turns: conversation.turns.clone(),
        })
    }

    /// Pause state after the conversation's last completed round trip
    pub fn lifecycle_status(&self, id: &ConversationId) -> Option<LifecycleStatus> {
        self.conversations
            .lock()
            .get(id)
            .map(|entry| entry.lifecycle.lock().clone())
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.lock().len()
    }

    fn entry(&self, id: &ConversationId) -> Entry {
        self.conversations
            .lock()
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::debug!(conversation_id = %id, "New conversation");
                Entry::new(Conversation::new(
                    id.clone(),
                    self.config.approval_function.clone(),
                ))
            })
            .clone()
    }

    fn existing(&self, id: &ConversationId) -> Option<Entry> {
        self.conversations.lock().get(id).cloned()
    }

    /// Remove a conversation that never got a session, unless another request holds it
    fn discard_unused(&self, id: &ConversationId, entry: &Entry) {
        let mut conversations = self.conversations.lock();
        let Some(current) = conversations.get(id) else {
            return;
        };
        // Handles are only cloned under this lock: the map's and ours means no one else
        if !Arc::ptr_eq(&current.conversation, &entry.conversation)
            || Arc::strong_count(&entry.conversation) > 2
        {
            return;
        }
        conversations.remove(id);
        drop(conversations);
        self.sessions.forget(id);
        tracing::debug!(conversation_id = %id, "Discarded conversation without a session");
    }

    /// Fold a batch into the conversation and describe it for the relay
    fn absorb(
        &self,
        conversation: &mut Conversation,
        session_id: SessionId,
        batch: EventBatch,
        original_request: String,
    ) -> TurnOutcome {
        if batch.malformed > 0 {
            tracing::warn!(
                conversation_id = %conversation.id,
                malformed = batch.malformed,
                "Backend batch contained malformed events"
            );
        }

        let interpretation = self.interpreter.interpret(&batch.events);

        // Only the approval the client can resolve counts as a pause
        if let Some(approval) = &interpretation.pending_approval {
            conversation
                .pending
                .insert(approval.clone(), original_request.clone());
            conversation.tracker.mark_paused(&approval.tool_call_id);
            tracing::info!(
                conversation_id = %conversation.id,
                tool_call_id = %approval.tool_call_id,
                action = %approval.action,
                "Approval requested"
            );
        }
        conversation.tracker.observe(&batch.events);

        if !interpretation.is_empty() {
            conversation.push(Turn::agent(
                interpretation.text.clone(),
                interpretation.pending_approval.clone(),
            ));
        }

        TurnOutcome {
            conversation_id: conversation.id.clone(),
            session_id,
            text: interpretation.text,
            pending_approval: interpretation.pending_approval,
            original_request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::Frame;
    use crate::lifecycle::AgentStatus;
    use crate::test_support::{MockBackend, pending_event, text_event};
    use futures::StreamExt;
    use hitl_backend::Part;
    use std::time::Duration;

    fn gateway(mock: Arc<MockBackend>) -> Gateway {
        Gateway::new(
            mock,
            AppIdentity::new("chat", "user1"),
            GatewayConfig {
                relay: RelayConfig {
                    word_delay: Duration::ZERO,
                    ..Default::default()
                },
                ..Default::default()
            },
        )
    }

    fn resumed_id(mock: &MockBackend, index: usize) -> Option<String> {
        match &mock.runs()[index].new_message.parts[0] {
            Part::FunctionResponse { function_response } => function_response.id.clone(),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_email_approval_scenario() {
        let mock = Arc::new(MockBackend::new());
        let gateway = gateway(mock.clone());
        let conv = ConversationId::new("c1");

        mock.push_response(vec![pending_event("call-1", "send email", "to a@b.com")]);
        let frames: Vec<Frame> = gateway
            .stream_turn(&conv, "Send an email to a@b.com")
            .await
            .collect()
            .await;

        assert_eq!(frames.len(), 2);
        match &frames[0] {
            Frame::ToolCall { tool_call_id, args, result, .. } => {
                assert_eq!(tool_call_id, "call-1");
                assert_eq!(args.action, "send email");
                assert_eq!(args.details, "to a@b.com");
                assert_eq!(result.original_message, "Send an email to a@b.com");
            }
            other => panic!("expected tool_call, got {:?}", other),
        }
        assert!(matches!(&frames[1], Frame::Done { session_id, .. } if session_id == "sess-1"));

        mock.push_response(vec![text_event("Email sent.")]);
        let frames: Vec<Frame> = gateway
            .stream_resolution(&conv, ApprovalDecision::new("call-1", true))
            .await
            .collect()
            .await;

        assert_eq!(
            frames,
            vec![
                Frame::text("Email"),
                Frame::text(" sent."),
                Frame::Done {
                    session_id: "sess-1".into(),
                    conversation_id: "c1".into(),
                },
            ]
        );

        let runs = mock.runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].session_id, runs[0].session_id);
        assert_eq!(resumed_id(&mock, 1).as_deref(), Some("call-1"));
        match &runs[1].new_message.parts[0] {
            Part::FunctionResponse { function_response } => {
                assert_eq!(function_response.status(), Some("approved"));
                assert_eq!(
                    function_response.response["original_request"],
                    "Send an email to a@b.com"
                );
            }
            other => panic!("expected function response, got {:?}", other),
        }
        assert_eq!(mock.session_calls(), 1);

        let status = gateway.conversation_status(&conv).await.unwrap();
        assert!(status.pending_approvals.is_empty());
        assert_eq!(status.lifecycle.agent_status, AgentStatus::Active);
        assert_eq!(status.lifecycle.completed_count, 1);
        assert_eq!(status.turn_count, 4);
    }

    #[tokio::test]
    async fn test_unknown_id_makes_no_backend_call() {
        let mock = Arc::new(MockBackend::new());
        let gateway = gateway(mock.clone());
        let conv = ConversationId::new("c1");

        mock.push_response(vec![pending_event("call-1", "send email", "x")]);
        gateway.submit_turn(&conv, "hi").await.unwrap();

        let err = gateway
            .resolve_approval(&conv, ApprovalDecision::new("call-404", true))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownApproval(id) if id == "call-404"));
        assert_eq!(mock.runs().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_conversation_resolution_fails() {
        let mock = Arc::new(MockBackend::new());
        let gateway = gateway(mock.clone());

        let frames: Vec<Frame> = gateway
            .stream_resolution(&ConversationId::new("nope"), ApprovalDecision::new("call-1", false))
            .await
            .collect()
            .await;

        assert_eq!(frames, vec![Frame::error("Unknown pending approval: call-1")]);
        assert!(mock.runs().is_empty());
        assert_eq!(mock.session_calls(), 0);
    }

    #[tokio::test]
    async fn test_resolving_twice_fails_second_time() {
        let mock = Arc::new(MockBackend::new());
        let gateway = gateway(mock.clone());
        let conv = ConversationId::new("c1");

        mock.push_response(vec![pending_event("call-1", "send email", "x")]);
        gateway.submit_turn(&conv, "hi").await.unwrap();
        gateway
            .resolve_approval(&conv, ApprovalDecision::new("call-1", false))
            .await
            .unwrap();

        assert!(matches!(
            gateway
                .resolve_approval(&conv, ApprovalDecision::new("call-1", false))
                .await,
            Err(Error::UnknownApproval(_))
        ));
        assert_eq!(mock.runs().len(), 2);
    }

    #[tokio::test]
    async fn test_chained_approvals_surface_distinct_requests() {
        let mock = Arc::new(MockBackend::new());
        let gateway = gateway(mock.clone());
        let conv = ConversationId::new("c1");

        mock.push_response(vec![pending_event("call-1", "send email", "to a@b.com")]);
        let first = gateway.submit_turn(&conv, "Email a@b.com then clean up").await.unwrap();
        assert_eq!(first.pending_approval.unwrap().tool_call_id, "call-1");

        mock.push_response(vec![
            text_event("Email sent. Next I need to delete the draft."),
            pending_event("call-2", "delete files", "/drafts/1"),
        ]);
        let second = gateway
            .resolve_approval(&conv, ApprovalDecision::new("call-1", true))
            .await
            .unwrap();
        let chained = second.pending_approval.unwrap();
        assert_eq!(chained.tool_call_id, "call-2");
        assert_eq!(second.original_request, "Email a@b.com then clean up");

        mock.push_response(vec![text_event("All done.")]);
        let third = gateway
            .resolve_approval(&conv, ApprovalDecision::new("call-2", true))
            .await
            .unwrap();
        assert!(third.pending_approval.is_none());
        assert_eq!(third.text, "All done.");

        assert_eq!(resumed_id(&mock, 2).as_deref(), Some("call-2"));
        assert!(mock.runs().iter().all(|r| r.session_id.as_str() == "sess-1"));
    }

    #[tokio::test]
    async fn test_empty_batch_still_completes() {
        let mock = Arc::new(MockBackend::new());
        let gateway = gateway(mock.clone());

        let frames: Vec<Frame> = gateway
            .stream_turn(&ConversationId::new("c1"), "hello?")
            .await
            .collect()
            .await;

        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], Frame::Done { .. }));
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let mock = Arc::new(MockBackend::new());
        let gateway = gateway(mock.clone());

        assert!(matches!(
            gateway.submit_turn(&ConversationId::new("c1"), "   ").await,
            Err(Error::EmptyMessage)
        ));
        assert_eq!(mock.session_calls(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_appends_nothing_and_keeps_approval() {
        let mock = Arc::new(MockBackend::new());
        let gateway = gateway(mock.clone());
        let conv = ConversationId::new("c1");

        mock.push_response(vec![pending_event("call-1", "send email", "x")]);
        gateway.submit_turn(&conv, "hi").await.unwrap();

        mock.fail_next_run(hitl_backend::Error::status(500, "boom"));
        let frames: Vec<Frame> = gateway
            .stream_resolution(&conv, ApprovalDecision::new("call-1", true))
            .await
            .collect()
            .await;
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], Frame::Error { .. }));

        let status = gateway.conversation_status(&conv).await.unwrap();
        assert_eq!(status.pending_approvals, vec!["call-1".to_string()]);
        assert_eq!(status.turn_count, 2);

        mock.push_response(vec![text_event("Email sent.")]);
        let outcome = gateway
            .resolve_approval(&conv, ApprovalDecision::new("call-1", true))
            .await
            .unwrap();
        assert_eq!(outcome.text, "Email sent.");
    }

    #[tokio::test]
    async fn test_session_creation_failure_surfaces_and_retries() {
        let mock = Arc::new(MockBackend::new());
        let gateway = gateway(mock.clone());
        let conv = ConversationId::new("c1");

        mock.fail_next_session(hitl_backend::Error::status(503, "starting"));
        let frames: Vec<Frame> = gateway.stream_turn(&conv, "hi").await.collect().await;
        match &frames[..] {
            [Frame::Error { message }] => assert!(message.contains("trouble connecting")),
            other => panic!("expected one error frame, got {:?}", other),
        }
        assert!(mock.runs().is_empty());
        assert_eq!(gateway.conversation_count(), 0);
        assert!(gateway.lifecycle_status(&conv).is_none());

        mock.push_response(vec![text_event("Hello!")]);
        let outcome = gateway.submit_turn(&conv, "hi").await.unwrap();
        assert_eq!(outcome.session_id.as_str(), "sess-2");
        assert_eq!(gateway.conversation_count(), 1);
    }

    #[tokio::test]
    async fn test_session_failure_keeps_conversation_with_history() {
        let mock = Arc::new(MockBackend::new());
        let gateway = gateway(mock.clone());
        let conv = ConversationId::new("c1");

        mock.push_response(vec![text_event("Hello!")]);
        gateway.submit_turn(&conv, "hi").await.unwrap();
        gateway.reset_session(&conv);

        mock.fail_next_session(hitl_backend::Error::status(503, "starting"));
        assert!(gateway.submit_turn(&conv, "still there?").await.is_err());
        assert_eq!(gateway.conversation_count(), 1);
        assert_eq!(gateway.conversation_status(&conv).await.unwrap().turn_count, 2);
    }

    #[tokio::test]
    async fn test_turns_on_one_conversation_are_serialised() {
        let mock = Arc::new(MockBackend::new().with_run_delay(Duration::from_millis(20)));
        let gateway = Arc::new(gateway(mock.clone()));
        let conv = ConversationId::new("c1");

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let gateway = gateway.clone();
                let conv = conv.clone();
                tokio::spawn(async move { gateway.submit_turn(&conv, &format!("turn {i}")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(mock.max_in_flight(), 1);
        assert_eq!(mock.session_calls(), 1);
    }

    #[tokio::test]
    async fn test_end_conversation_clears_everything() {
        let mock = Arc::new(MockBackend::new());
        let gateway = gateway(mock.clone());
        let conv = ConversationId::new("c1");

        mock.push_response(vec![pending_event("call-1", "send email", "x")]);
        gateway.submit_turn(&conv, "hi").await.unwrap();

        assert!(gateway.end_conversation(&conv));
        assert!(!gateway.end_conversation(&conv));
        assert!(gateway.conversation_status(&conv).await.is_none());
        assert!(matches!(
            gateway
                .resolve_approval(&conv, ApprovalDecision::new("call-1", true))
                .await,
            Err(Error::UnknownApproval(_))
        ));

        gateway.submit_turn(&conv, "again").await.unwrap();
        assert_eq!(mock.session_calls(), 2);
    }

    #[tokio::test]
    async fn test_lost_session_is_explicit() {
        let mock = Arc::new(MockBackend::new());
        let gateway = gateway(mock.clone());
        let conv = ConversationId::new("c1");

        mock.push_response(vec![pending_event("call-1", "send email", "x")]);
        gateway.submit_turn(&conv, "hi").await.unwrap();
        gateway.reset_session(&conv);

        assert!(matches!(
            gateway
                .resolve_approval(&conv, ApprovalDecision::new("call-1", true))
                .await,
            Err(Error::SessionLost(_))
        ));
        assert_eq!(mock.runs().len(), 1);

        assert_eq!(
            gateway.lifecycle_status(&conv).unwrap().agent_status,
            AgentStatus::Paused
        );

        gateway.submit_turn(&conv, "start over").await.unwrap();
        let status = gateway.conversation_status(&conv).await.unwrap();
        assert!(status.pending_approvals.is_empty());
        assert!(status.lifecycle.pending_tools.is_empty());
        assert_eq!(status.lifecycle.agent_status, AgentStatus::Active);
        assert_eq!(status.session_id.unwrap().as_str(), "sess-2");
        assert_eq!(gateway.lifecycle_status(&conv), Some(status.lifecycle));
    }

    #[tokio::test]
    async fn test_ignored_duplicate_approval_never_pauses() {
        let mock = Arc::new(MockBackend::new());
        let gateway = gateway(mock.clone());
        let conv = ConversationId::new("c1");

        mock.push_response(vec![
            pending_event("first", "send email", "to a@b.com"),
            pending_event("second", "delete files", "/tmp"),
        ]);
        let outcome = gateway.submit_turn(&conv, "do both").await.unwrap();
        assert_eq!(outcome.pending_approval.unwrap().tool_call_id, "first");

        let lifecycle = gateway.lifecycle_status(&conv).unwrap();
        assert_eq!(lifecycle.pending_tools, vec!["first".to_string()]);

        mock.push_response(vec![text_event("Email sent.")]);
        gateway
            .resolve_approval(&conv, ApprovalDecision::new("first", true))
            .await
            .unwrap();

        let status = gateway.conversation_status(&conv).await.unwrap();
        assert!(status.pending_approvals.is_empty());
        assert!(status.lifecycle.pending_tools.is_empty());
        assert_eq!(status.lifecycle.agent_status, AgentStatus::Active);
        assert!(matches!(
            gateway
                .resolve_approval(&conv, ApprovalDecision::new("second", true))
                .await,
            Err(Error::UnknownApproval(id)) if id == "second"
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_status_does_not_wait_for_turn_in_flight() {
        let mock = Arc::new(MockBackend::new().with_run_delay(Duration::from_millis(100)));
        let gateway = Arc::new(gateway(mock.clone()));
        let conv = ConversationId::new("c1");
        assert!(gateway.lifecycle_status(&conv).is_none());

        mock.push_response(vec![pending_event("call-1", "send email", "x")]);
        gateway.submit_turn(&conv, "hi").await.unwrap();

        mock.push_response(vec![text_event("Still waiting on you.")]);
        let in_flight = {
            let gateway = gateway.clone();
            let conv = conv.clone();
            tokio::spawn(async move { gateway.submit_turn(&conv, "status?").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let lifecycle = gateway.lifecycle_status(&conv).unwrap();
        assert_eq!(lifecycle.agent_status, AgentStatus::Paused);
        assert_eq!(lifecycle.pending_tools, vec!["call-1".to_string()]);

        in_flight.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_end_conversation_cancels_open_stream() {
        let mock = Arc::new(MockBackend::new());
        let gateway = Gateway::new(
            mock.clone(),
            AppIdentity::new("chat", "user1"),
            GatewayConfig {
                relay: RelayConfig {
                    word_delay: Duration::from_secs(30),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        let conv = ConversationId::new("c1");

        mock.push_response(vec![text_event("one two three")]);
        let mut stream = gateway.stream_turn(&conv, "count").await;
        assert_eq!(stream.next().await, Some(Frame::text("one")));

        gateway.end_conversation(&conv);
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let mock = Arc::new(MockBackend::new());
        let gateway = gateway(mock.clone());
        let a = ConversationId::new("a");
        let b = ConversationId::new("b");

        mock.push_response(vec![pending_event("call-1", "send email", "x")]);
        gateway.submit_turn(&a, "hi").await.unwrap();
        gateway.submit_turn(&b, "hi").await.unwrap();

        assert!(matches!(
            gateway
                .resolve_approval(&b, ApprovalDecision::new("call-1", true))
                .await,
            Err(Error::UnknownApproval(_))
        ));
        assert_eq!(gateway.conversation_count(), 2);
        let a_session = gateway.conversation_status(&a).await.unwrap().session_id;
        let b_session = gateway.conversation_status(&b).await.unwrap().session_id;
        assert_ne!(a_session, b_session);
    }
}
