//! OAuth2 client-credentials token acquisition with a per-environment cache
//!
//! Each environment (keyed by base URL) owns one async mutex. The mutex is
//! held while a token is exchanged, so concurrent callers queue behind the
//! in-flight refresh and then read its result instead of issuing their own.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::Environment;
use crate::error::{Error, Result};

/// Token endpoint path relative to an environment base URL
pub const TOKEN_PATH: &str = "/v1/auth/token";

/// Fraction of the declared lifetime after which a token is treated as expired
const EXPIRY_RATIO: f64 = 0.9;

/// Source of bearer tokens for an environment
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Cached token, refreshed first if missing or expired
    async fn get_access_token(&self, environment: &Environment) -> Result<String>;

    /// Exchange credentials for a new token regardless of the cache
    async fn refresh_access_token(&self, environment: &Environment) -> Result<String>;

    /// Whether a cached, unexpired token exists
    async fn is_token_valid(&self, environment: &Environment) -> bool;
}

/// Token response from `POST /v1/auth/token`
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => Instant::now() >= exp,
            None => false,
        }
    }
}

type TokenSlot = Arc<tokio::sync::Mutex<Option<CachedToken>>>;

/// Lifetime after which a token with `expires_in` seconds is refreshed
pub fn effective_lifetime(expires_in: u64) -> Duration {
    Duration::from_secs(expires_in).mul_f64(EXPIRY_RATIO)
}

/// reqwest-backed [`TokenProvider`] caching one token per base URL
pub struct TokenCache {
    http_client: Client,
    slots: Mutex<HashMap<String, TokenSlot>>,
}

impl TokenCache {
    /// Create a cache that exchanges tokens with `http_client`
    pub fn new(http_client: Client) -> Self {
        Self {
            http_client,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, environment: &Environment) -> TokenSlot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(environment.base_url.clone())
            .or_default()
            .clone()
    }

    async fn exchange(&self, environment: &Environment) -> Result<CachedToken> {
        let url = environment.url(TOKEN_PATH);
        debug!(environment = %environment.name, url = %url, "Requesting access token");

        let response = self
            .http_client
            .post(&url)
            .basic_auth(&environment.client_id, Some(&environment.client_secret))
            .json(&serde_json::json!({ "grant_type": "client_credentials" }))
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token request to {} failed: {e}", environment.name)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(Error::Auth(format!(
                "token endpoint of {} returned {status}: {body}",
                environment.name
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            Error::Auth(format!(
                "invalid token response from {}: {e}",
                environment.name
            ))
        })?;

        if token.access_token.is_empty() {
            return Err(Error::Auth(format!(
                "token endpoint of {} returned an empty access token",
                environment.name
            )));
        }

        info!(
            environment = %environment.name,
            token_type = token.token_type.as_deref().unwrap_or("Bearer"),
            expires_in = ?token.expires_in,
            "Access token acquired"
        );

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: token
                .expires_in
                .map(|secs| Instant::now() + effective_lifetime(secs)),
        })
    }
}

#[async_trait]
impl TokenProvider for TokenCache {
    async fn get_access_token(&self, environment: &Environment) -> Result<String> {
        let slot = self.slot(environment);
        let mut cached = slot.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.access_token.clone());
        }

        let token = self.exchange(environment).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn refresh_access_token(&self, environment: &Environment) -> Result<String> {
        let slot = self.slot(environment);
        let mut cached = slot.lock().await;

        let token = self.exchange(environment).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn is_token_valid(&self, environment: &Environment) -> bool {
        let slot = self.slot(environment);
        let cached = slot.lock().await;
        cached.as_ref().is_some_and(|t| !t.is_expired())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_lifetime_is_ninety_percent() {
        assert_eq!(effective_lifetime(3600), Duration::from_secs(3240));
        assert_eq!(effective_lifetime(0), Duration::ZERO);
    }

    #[test]
    fn test_cached_token_expiry() {
        let fresh = CachedToken {
            access_token: "t".into(),
            expires_at: Some(Instant::now() + Duration::from_secs(60)),
        };
        assert!(!fresh.is_expired());

        let stale = CachedToken {
            access_token: "t".into(),
            expires_at: Some(Instant::now()),
        };
        assert!(stale.is_expired());

        let unbounded = CachedToken {
            access_token: "t".into(),
            expires_at: None,
        };
        assert!(!unbounded.is_expired());
    }

    #[test]
    fn test_empty_cache_is_invalid() {
        let cache = TokenCache::new(Client::new());
        let env = Environment::new("master", "http://localhost:1", "id", "secret");
        assert!(!tokio_test::block_on(cache.is_token_valid(&env)));
    }

    #[test]
    fn test_slots_keyed_by_base_url() {
        let cache = TokenCache::new(Client::new());
        let a = Environment::new("master", "http://a.example.com", "id", "secret");
        let a_again = Environment::new("other-name", "http://a.example.com/", "id", "secret");
        let b = Environment::new("target", "http://b.example.com", "id", "secret");

        assert!(Arc::ptr_eq(&cache.slot(&a), &cache.slot(&a_again)));
        assert!(!Arc::ptr_eq(&cache.slot(&a), &cache.slot(&b)));
    }
}
