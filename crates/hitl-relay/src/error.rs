//! Error types for hitl-relay

use thiserror::Error;

/// Result type alias using hitl-relay Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a turn or a resolution
#[derive(Error, Debug)]
pub enum Error {
    /// The backend session could not be created; the conversation stays unbound
    #[error("Failed to create backend session: {0}")]
    SessionCreation(#[source] hitl_backend::Error),

    /// A run call failed (non-success status, transport or shape error)
    #[error(transparent)]
    Backend(#[from] hitl_backend::Error),

    /// The tool call id is not in the pending set (never issued, or already resolved)
    #[error("Unknown pending approval: {0}")]
    UnknownApproval(String),

    /// A decision for this tool call id is already on its way to the backend
    #[error("Approval {0} is already being resolved")]
    ApprovalInFlight(String),

    /// The conversation's session binding was dropped while approvals were pending
    #[error("Session for conversation {0} was lost")]
    SessionLost(String),

    /// The human turn had no text
    #[error("Message is empty")]
    EmptyMessage,
}

impl Error {
    /// Text suitable for the terminal error frame shown to the human
    pub fn user_message(&self) -> String {
        match self {
            Error::SessionCreation(_) => "Sorry, I'm having trouble connecting to the agent \
                backend. Please check that it is running and try again."
                .to_string(),
            Error::Backend(e) if e.is_connectivity() => {
                "Sorry, the agent backend is unreachable right now. Please try again.".to_string()
            }
            Error::Backend(_) => "The agent backend failed to process this request.".to_string(),
            Error::SessionLost(_) => {
                "This conversation's session was lost. Send a new message to start over."
                    .to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether the failure is the client's fault (bad id, empty text) rather than the backend's
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownApproval(_) | Error::ApprovalInFlight(_) | Error::EmptyMessage
        )
    }
}
