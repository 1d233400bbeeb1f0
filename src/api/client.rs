//! HTTP client for the finance-tracker backend.
//!
//! This module provides the `ApiClient` struct for talking to the backend:
//! obtaining and refreshing JWT token pairs, probing whether the current
//! access token is still accepted, and fetching the greeting.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::models::{Greeting, TokenPair};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Token-obtain endpoint (SimpleJWT token pair)
const LOGIN_PATH: &str = "/api/token/";

/// Token-refresh endpoint
const REFRESH_PATH: &str = "/api/token/refresh/";

/// Lightweight authenticated probe endpoint
const PROBE_PATH: &str = "/auth";

/// Greeting endpoint shown on the home view
const GREETING_PATH: &str = "/api/hello/";

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// API client for the backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client with a fixed base address.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    /// Set the bearer token attached to authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Remove the bearer token (logout)
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the access credential as a bearer header when present.
    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Check if response is successful, returning a typed error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .apply_auth(self.client.get(self.url(path)))
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Obtain a fresh token pair for the given credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, ApiError> {
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Exchange a refresh credential for a new access token.
    ///
    /// Deliberately unauthenticated: the refresh credential travels in the
    /// body, not the bearer header.
    pub async fn refresh_access(&self, refresh: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .json(&json!({ "refresh": refresh }))
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        Ok(body.access)
    }

    /// Probe a protected endpoint to confirm the backend still accepts the
    /// current access token. Any non-2xx status or transport failure is an
    /// error; the body is ignored.
    pub async fn probe_auth(&self) -> Result<(), ApiError> {
        let response = self
            .apply_auth(self.client.get(self.url(PROBE_PATH)))
            .send()
            .await?;

        Self::check_response(response).await?;
        debug!("auth probe accepted");
        Ok(())
    }

    /// Fetch the greeting shown on the home view.
    pub async fn fetch_greeting(&self) -> Result<Greeting, ApiError> {
        self.get_json(GREETING_PATH).await
    }
}
