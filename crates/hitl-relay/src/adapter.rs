//! Backend adapter: one call shape for human turns and resumptions

use hitl_backend::{AgentBackend, AppIdentity, EventBatch, NewMessage, RunRequest, SessionId};
use std::sync::Arc;
use std::time::Instant;

use crate::approval::ResumptionPayload;
use crate::error::{Error, Result};
use crate::lifecycle::Phase;

/// Sends turns and resumptions to the backend under a fixed app/user identity.
///
/// Never retries: resending to a stateful session is not idempotent, so any
/// failure goes straight back to the caller.
#[derive(Clone)]
pub struct BackendAdapter {
    backend: Arc<dyn AgentBackend>,
    identity: AppIdentity,
}

impl BackendAdapter {
    pub fn new(backend: Arc<dyn AgentBackend>, identity: AppIdentity) -> Self {
        Self { backend, identity }
    }

    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    pub async fn create_session(&self) -> Result<SessionId> {
        let session_id = self
            .backend
            .create_session(&self.identity)
            .await
            .map_err(Error::SessionCreation)?;
        tracing::info!(session_id = %session_id, app = %self.identity.app_name, "Created backend session");
        Ok(session_id)
    }

    /// Send a human turn
    pub async fn send_turn(&self, session_id: &SessionId, text: &str) -> Result<EventBatch> {
        self.run(session_id, NewMessage::text(text), Phase::InitialRequest)
            .await
    }

    /// Send a decision that unblocks a suspended call
    pub async fn send_resumption(
        &self,
        session_id: &SessionId,
        payload: &ResumptionPayload,
    ) -> Result<EventBatch> {
        let message = NewMessage::function_response(payload.to_function_response());
        self.run(session_id, message, Phase::ResumeAfterApproval)
            .await
    }

    async fn run(&self, session_id: &SessionId, message: NewMessage, phase: Phase) -> Result<EventBatch> {
        let request = RunRequest::new(&self.identity, session_id, message);
        let started = Instant::now();

        tracing::debug!(%phase, session_id = %session_id, "Sending to backend");

        match self.backend.run(&request).await {
            Ok(batch) => {
                tracing::info!(
                    %phase,
                    session_id = %session_id,
                    events = batch.len(),
                    malformed = batch.malformed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Backend responded"
                );
                Ok(batch)
            }
            Err(e) => {
                tracing::warn!(%phase, session_id = %session_id, error = %e, "Backend call failed");
                Err(e.into())
            }
        }
    }
}
