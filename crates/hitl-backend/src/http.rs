//! HTTP client for the agent backend

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    client::AgentBackend,
    error::{Error, Result},
    types::{AppIdentity, EventBatch, RunRequest, SessionId, SessionInfo},
};

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Agent backend reached over HTTP
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpBackend {
    /// Create a client for the backend at `base_url` with the default timeout
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with a specific per-request timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = reqwest::Url::parse(base_url)
            .map_err(|e| Error::InvalidConfig(format!("backend url '{}': {}", base_url, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "backend url must be http or https, got '{}'",
                base_url.scheme()
            )));
        }
        // Url::join replaces the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// The normalized base URL
    pub fn base_url(&self) -> &reqwest::Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::InvalidConfig(format!("endpoint '{}': {}", path, e)))
    }

    /// Turn a non-success response into a status error carrying its body
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::status(status.as_u16(), body))
    }
}

#[async_trait]
impl AgentBackend for HttpBackend {
    async fn create_session(&self, identity: &AppIdentity) -> Result<SessionId> {
        let url = self.endpoint(&format!(
            "apps/{}/users/{}/sessions",
            identity.app_name, identity.user_id
        ))?;

        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let info: SessionInfo = response.json().await?;
        if info.id.is_empty() {
            return Err(Error::UnexpectedResponse(
                "session response has no id".to_string(),
            ));
        }

        tracing::debug!(session_id = %info.id, app = %identity.app_name, "Created backend session");
        Ok(SessionId::new(info.id))
    }

    async fn run(&self, request: &RunRequest) -> Result<EventBatch> {
        let url = self.endpoint("run")?;

        let response = self.client.post(url).json(request).send().await?;
        let response = Self::check_status(response).await?;

        let body: serde_json::Value = response.json().await?;
        match body {
            serde_json::Value::Array(values) => Ok(EventBatch::from_values(values)),
            other => Err(Error::UnexpectedResponse(format!(
                "run response is not an event array: {}",
                truncate(&other.to_string(), 200)
            ))),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}
