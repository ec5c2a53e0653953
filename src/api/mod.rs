//! Scheduling API access for one environment
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ ResourceClient (ResourceRepository)          │
//! │  - resources / unavailabilities              │
//! │  - pagination                                │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │ Transport                                    │
//! │  - GET / POST / PUT / DELETE + JSON decode   │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │ TokenProvider (TokenCache)                   │
//! │  POST /v1/auth/token, cached per base URL    │
//! └──────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod client;
pub mod transport;

pub use auth::{TokenCache, TokenProvider};
pub use client::{ResourceClient, ResourceRepository};
pub use transport::Transport;

use crate::config::EnvironmentConfig;

/// One scheduling API instance: base URL plus client credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Environment {
    /// Label used in logs and error messages ("master", "target")
    pub name: String,

    /// Base URL without trailing slash
    pub base_url: String,

    pub client_id: String,

    pub client_secret: String,
}

impl Environment {
    /// Create a new environment descriptor
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Build from a loaded configuration section
    pub fn from_config(name: &str, config: &EnvironmentConfig) -> Self {
        Self::new(
            name,
            config.base_url.as_str(),
            config.client_id.as_str(),
            config.client_secret.as_str(),
        )
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let env = Environment::new("master", "https://api.example.com/", "id", "secret");
        assert_eq!(env.base_url, "https://api.example.com");
        assert_eq!(
            env.url("/v1/resources/resource"),
            "https://api.example.com/v1/resources/resource"
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let env = Environment::new("target", "https://api.example.com", "id", "s3cr3t");
        assert!(!format!("{env:?}").contains("s3cr3t"));
    }
}
