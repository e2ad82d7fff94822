//! Backend client abstraction

use async_trait::async_trait;

use crate::{
    error::Result,
    types::{AppIdentity, EventBatch, RunRequest, SessionId},
};

/// A stateful agent backend exposing session-create and run endpoints
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Create a new backend session for the given app/user
    async fn create_session(&self, identity: &AppIdentity) -> Result<SessionId>;

    /// Submit one message to a session and collect the resulting events.
    ///
    /// Not retried: resending to a stateful session is not always idempotent.
    async fn run(&self, request: &RunRequest) -> Result<EventBatch>;
}
