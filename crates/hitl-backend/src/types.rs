//! Wire types for the agent backend

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Backend-assigned session handle. Opaque to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The app/user pair every backend call is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub app_name: String,
    pub user_id: String,
}

impl AppIdentity {
    pub fn new(app_name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
        }
    }
}

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A function invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// The result of a function invocation, or a resumption supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub response: serde_json::Value,
}

impl FunctionResponse {
    /// The `status` field of the response payload, if it has one
    pub fn status(&self) -> Option<&str> {
        self.response.get("status").and_then(|s| s.as_str())
    }
}

/// One content entry of a backend event.
///
/// Variant order matters: serde tries them top to bottom and the last one
/// catches any shape the gateway does not understand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought: Option<bool>,
    },
    FunctionCall {
        #[serde(rename = "function_call", alias = "functionCall")]
        function_call: FunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "function_response", alias = "functionResponse")]
        function_response: FunctionResponse,
    },
    Other(serde_json::Value),
}

impl Part {
    /// Create a plain text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            thought: None,
        }
    }

    /// Create a function-call part
    pub fn function_call(
        id: impl Into<String>,
        name: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        Self::FunctionCall {
            function_call: FunctionCall {
                id: Some(id.into()),
                name: name.into(),
                args,
            },
        }
    }

    /// Create a function-response part
    pub fn function_response(
        id: impl Into<String>,
        name: impl Into<String>,
        response: serde_json::Value,
    ) -> Self {
        Self::FunctionResponse {
            function_response: FunctionResponse {
                id: Some(id.into()),
                name: name.into(),
                response,
            },
        }
    }

    /// Display text, if this is a non-thought text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, thought } if *thought != Some(true) => Some(text),
            _ => None,
        }
    }
}

/// Message content: a role and its ordered parts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parts: Vec<Part>,
}

/// One event from a run response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, alias = "invocation_id")]
    pub invocation_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(
        default,
        alias = "long_running_tool_ids",
        deserialize_with = "null_as_default"
    )]
    pub long_running_tool_ids: Vec<String>,
    #[serde(default, alias = "turn_complete")]
    pub turn_complete: Option<bool>,
    #[serde(default)]
    pub partial: Option<bool>,
    #[serde(default)]
    pub content: Option<Content>,
}

impl BackendEvent {
    /// Create an event authored by the agent with the given parts
    pub fn with_parts(parts: Vec<Part>) -> Self {
        Self {
            content: Some(Content {
                role: Some("model".to_string()),
                parts,
            }),
            ..Default::default()
        }
    }

    /// Content parts in backend order (empty when the event has no content)
    pub fn parts(&self) -> &[Part] {
        self.content
            .as_ref()
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }
}

/// Events decoded from one run response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBatch {
    pub events: Vec<BackendEvent>,
    /// Elements of the response array that could not be decoded and were skipped
    pub malformed: usize,
}

impl EventBatch {
    pub fn new(events: Vec<BackendEvent>) -> Self {
        Self {
            events,
            malformed: 0,
        }
    }

    /// Decode a raw response array one element at a time.
    ///
    /// A bad element is logged and skipped; it never discards the rest of the batch.
    pub fn from_values(values: Vec<serde_json::Value>) -> Self {
        let mut events = Vec::with_capacity(values.len());
        let mut malformed = 0;

        for (index, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<BackendEvent>(value) {
                Ok(event) => events.push(event),
                Err(e) => {
                    malformed += 1;
                    tracing::warn!(index, error = %e, "Skipping malformed backend event");
                }
            }
        }

        Self { events, malformed }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// The message envelope carried by a run request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: String,
    pub parts: Vec<Part>,
}

impl NewMessage {
    /// A human turn
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::text(text)],
        }
    }

    /// A structured function response (used to resume a suspended call)
    pub fn function_response(response: FunctionResponse) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::FunctionResponse {
                function_response: response,
            }],
        }
    }
}

/// Body of a run request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: SessionId,
    pub new_message: NewMessage,
}

impl RunRequest {
    pub fn new(identity: &AppIdentity, session_id: &SessionId, new_message: NewMessage) -> Self {
        Self {
            app_name: identity.app_name.clone(),
            user_id: identity.user_id.clone(),
            session_id: session_id.clone(),
            new_message,
        }
    }
}

/// Session-creation response; only the id matters to the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub id: String,
}
