//! hitl-backend: wire layer for a stateful agent backend
//!
//! This crate models the backend's session-create and run endpoints: the
//! event batches it returns, the message envelopes it accepts, and an HTTP
//! client that speaks both.

pub mod client;
pub mod error;
pub mod http;
pub mod types;

pub use client::AgentBackend;
pub use error::{Error, Result};
pub use http::HttpBackend;
pub use types::*;
