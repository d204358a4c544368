//! API client for the console's authentication endpoints.
//!
//! This module provides the `AuthClient` struct, the reqwest-backed
//! `CredentialTransport` used outside of tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::envelope::{ApiMessage, ApiReply, Credentials, LoginData, RefreshData};
use super::{ApiError, CredentialTransport};

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Header carrying the static deployment credential.
const API_KEY_HEADER: &str = "api-key";

const LOGIN_PATH: &str = "/auth/login";
const LOGOUT_PATH: &str = "/auth/logout";
const REFRESH_PATH: &str = "/auth/refresh-token";

/// HTTP client for the auth API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AuthClient {
    /// Create a new client against `base_url` with the default timeout
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(
            base_url,
            api_key,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn base_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            API_KEY_HEADER,
            header::HeaderValue::from_str(&self.api_key)
                .map_err(|_| ApiError::InvalidResponse("API key is not a valid header value".into()))?,
        );
        Ok(headers)
    }

    fn bearer_headers(&self, access_token: &str) -> Result<header::HeaderMap, ApiError> {
        let mut headers = self.base_headers()?;
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", access_token))
                .map_err(|_| ApiError::InvalidResponse("Access token is not a valid header value".into()))?,
        );
        Ok(headers)
    }

    /// Check if response is successful, returning an error built from the body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_status(status, &body);
            warn!(status = status.as_u16(), error = %err, "Auth API request failed");
            Err(err)
        }
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response, what: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {} response: {}", what, e)))
    }

    /// Like `parse`, but an empty body (204 and friends) yields the default.
    async fn parse_or_default<T: DeserializeOwned + Default>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {} response: {}", what, e)))
    }

    async fn send(
        &self,
        path: &str,
        headers: header::HeaderMap,
        body: Option<&Credentials>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "POST");

        let mut request = self.client.post(&url).headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        Self::check_response(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        headers: header::HeaderMap,
        body: Option<&Credentials>,
        what: &str,
    ) -> Result<T, ApiError> {
        let response = self.send(path, headers, body).await?;
        Self::parse(response, what).await
    }
}

#[async_trait]
impl CredentialTransport for AuthClient {
    async fn login(&self, credentials: &Credentials) -> Result<ApiReply<LoginData>, ApiError> {
        self.post(LOGIN_PATH, self.base_headers()?, Some(credentials), "login")
            .await
    }

    async fn logout(&self, access_token: &str) -> Result<ApiMessage, ApiError> {
        let response = self
            .send(LOGOUT_PATH, self.bearer_headers(access_token)?, None)
            .await?;
        Self::parse_or_default(response, "logout").await
    }

    async fn refresh(&self, access_token: &str) -> Result<ApiReply<RefreshData>, ApiError> {
        self.post(REFRESH_PATH, self.bearer_headers(access_token)?, None, "refresh")
            .await
    }
}
