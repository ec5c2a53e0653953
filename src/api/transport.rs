//! Authenticated JSON transport for one environment

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::auth::TokenProvider;
use super::Environment;
use crate::error::{Error, Result};

/// Performs authenticated requests against one environment
pub struct Transport {
    http_client: Client,
    environment: Environment,
    tokens: Arc<dyn TokenProvider>,
}

impl Transport {
    /// Create a transport with its own HTTP client
    pub fn new(
        environment: Environment,
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .gzip(true)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(environment, tokens, http_client))
    }

    /// Create a transport around an existing HTTP client
    pub fn with_client(
        environment: Environment,
        tokens: Arc<dyn TokenProvider>,
        http_client: Client,
    ) -> Self {
        Self {
            http_client,
            environment,
            tokens,
        }
    }

    /// Environment this transport talks to
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// GET and decode; any non-success status is an error
    pub async fn get<T: DeserializeOwned>(
        &self,
        path_or_url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .send(self.http_client.get(self.url(path_or_url)).query(query))
            .await?;
        let response = ensure_success(response).await?;
        decode(response)
            .await?
            .ok_or_else(|| Error::Decode(format!("empty response body from {path_or_url}")))
    }

    /// GET and decode, mapping 404 to `None`
    pub async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self.send(self.http_client.get(self.url(path))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        decode(response).await
    }

    /// POST a JSON body; `None` when the server answers 2xx without a body
    pub async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>> {
        let response = self
            .send(self.http_client.post(self.url(path)).json(body))
            .await?;
        let response = ensure_success(response).await?;
        decode(response).await
    }

    /// PUT a JSON body; `None` when the server answers 2xx without a body
    pub async fn put<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>> {
        let response = self
            .send(self.http_client.put(self.url(path)).json(body))
            .await?;
        let response = ensure_success(response).await?;
        decode(response).await
    }

    /// DELETE; reports whether the server answered with a success status
    pub async fn delete(&self, path: &str) -> Result<bool> {
        let response = self.send(self.http_client.delete(self.url(path))).await?;
        Ok(response.status().is_success())
    }

    fn url(&self, path_or_url: &str) -> String {
        if is_absolute_url(path_or_url) {
            path_or_url.to_string()
        } else {
            self.environment.url(path_or_url)
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let token = self.tokens.get_access_token(&self.environment).await?;
        let response = builder
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{}: {e}", self.environment.name)))?;

        debug!(
            environment = %self.environment.name,
            url = %response.url(),
            status = response.status().as_u16(),
            "API response"
        );

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Auth(format!(
                "{} rejected the access token ({})",
                self.environment.name,
                response.status()
            ))),
            _ => Ok(response),
        }
    }
}

/// Whether `value` is an absolute http(s) URL rather than a path or cursor
pub fn is_absolute_url(value: &str) -> bool {
    url::Url::parse(value).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(Error::Http {
        status: status.as_u16(),
        message: response.text().await.unwrap_or_default(),
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<Option<T>> {
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| Error::Decode(e.to_string()))
}
