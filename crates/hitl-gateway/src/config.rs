//! Configuration file support

use hitl_backend::AppIdentity;
use hitl_relay::{GatewayConfig, RelayConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server listens on
    pub bind: String,
    /// Base URL of the agent backend
    pub backend_url: String,
    /// App identifier sent with every backend call
    pub app_name: String,
    /// User identifier sent with every backend call
    pub user_id: String,
    /// Backend function that suspends for a human decision
    pub approval_function: String,
    /// Pause between streamed words, in milliseconds (0 sends text at once)
    pub word_delay_ms: u64,
    /// Timeout for a single backend request
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            backend_url: "http://localhost:8000".to_string(),
            app_name: "chat".to_string(),
            user_id: "user1".to_string(),
            approval_function: hitl_relay::DEFAULT_APPROVAL_FUNCTION.to_string(),
            word_delay_ms: 50,
            request_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hitl")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("HITL_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a file, falling back to defaults if it is missing or broken
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to a file, creating its directory
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Save this config to the default location unless a config file already exists
    pub fn init(&self) -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn identity(&self) -> AppIdentity {
        AppIdentity::new(&self.app_name, &self.user_id)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            approval_function: self.approval_function.clone(),
            relay: RelayConfig {
                word_delay: Duration::from_millis(self.word_delay_ms),
                ..Default::default()
            },
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# hitl gateway configuration file
# Place at ~/.config/hitl/config.toml (Linux), ~/Library/Application Support/hitl/config.toml (Mac)
# or set HITL_CONFIG_PATH

# Address the HTTP server listens on
bind = "127.0.0.1:3000"

# Agent backend exposing /apps/{app}/users/{user}/sessions and /run
backend_url = "http://localhost:8000"

# Identity every backend call is scoped to
app_name = "chat"
user_id = "user1"

# Backend function that pauses the agent until a human approves or rejects
approval_function = "request_human_approval"

# Pause between streamed words in milliseconds (0 sends each reply at once)
word_delay_ms = 50

# Timeout for a single backend request
request_timeout_secs = 60
"#
}
