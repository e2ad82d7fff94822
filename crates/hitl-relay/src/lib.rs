//! hitl-relay: orchestration core for a human-in-the-loop agent gateway
//!
//! This crate owns session identity, interprets the backend's event batches,
//! relays them to clients as an ordered frame stream, and implements the
//! approve/reject protocol that resumes a suspended backend call.

pub mod adapter;
pub mod approval;
pub mod conversation;
pub mod error;
pub mod frames;
pub mod gateway;
pub mod interpreter;
pub mod lifecycle;
pub mod relay;
pub mod session;

#[cfg(test)]
mod test_support;

pub use adapter::BackendAdapter;
pub use approval::{
    ApprovalDecision, ApprovalRequest, ApprovalResolver, Decision, PendingApprovals,
    ResumptionPayload,
};
pub use conversation::{Conversation, ConversationId, Role, Turn};
pub use error::{Error, Result};
pub use frames::Frame;
pub use gateway::{ConversationStatus, Gateway, GatewayConfig};
pub use interpreter::{Anomaly, DEFAULT_APPROVAL_FUNCTION, Interpretation, Interpreter};
pub use lifecycle::{AgentStatus, LifecycleStatus, Phase, SuspensionTracker};
pub use relay::{FrameStream, RelayConfig, TurnOutcome};
pub use session::SessionStore;
