//! Configuration for the HTTP fetch gateway.

use serde::{Deserialize, Serialize};

/// Connection settings for the backend API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every request path is appended to
    pub base_url: String,
    /// Client-level request timeout; 0 disables it
    pub timeout_seconds: u64,
    /// Name of the environment variable holding the bearer token
    pub token_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            timeout_seconds: 30,
            token_env: "FLEETSYNC_TOKEN".to_string(),
        }
    }
}

impl ApiConfig {
    /// Read the bearer token from the configured environment variable.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}
