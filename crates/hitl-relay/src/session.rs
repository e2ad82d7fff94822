//! Conversation → backend session binding

use hitl_backend::SessionId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::adapter::BackendAdapter;
use crate::conversation::ConversationId;
use crate::error::Result;

/// Creates one backend session per conversation, lazily, and hands the same
/// id back on every later call.
///
/// Concurrent first calls for a conversation share a single creation request.
/// A failed creation leaves the slot empty so the next call tries again.
pub struct SessionStore {
    adapter: BackendAdapter,
    slots: Mutex<HashMap<ConversationId, Arc<OnceCell<SessionId>>>>,
}

impl SessionStore {
    pub fn new(adapter: BackendAdapter) -> Self {
        Self {
            adapter,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn ensure_session(&self, conversation_id: &ConversationId) -> Result<SessionId> {
        // The map lock is released before awaiting
        let slot = self
            .slots
            .lock()
            .entry(conversation_id.clone())
            .or_default()
            .clone();

        let session_id = slot
            .get_or_try_init(|| async {
                tracing::debug!(%conversation_id, "No session bound, creating one");
                self.adapter.create_session().await
            })
            .await?;

        Ok(session_id.clone())
    }

    /// The bound session, if one has been created
    pub fn get(&self, conversation_id: &ConversationId) -> Option<SessionId> {
        self.slots
            .lock()
            .get(conversation_id)
            .and_then(|slot| slot.get().cloned())
    }

    /// Drop the binding. The next `ensure_session` creates a fresh session.
    pub fn forget(&self, conversation_id: &ConversationId) -> Option<SessionId> {
        let slot = self.slots.lock().remove(conversation_id)?;
        let session_id = slot.get().cloned();
        if let Some(id) = &session_id {
            tracing::info!(%conversation_id, session_id = %id, "Session binding dropped");
        }
        session_id
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
