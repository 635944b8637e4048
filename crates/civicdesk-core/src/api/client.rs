//! API client for communicating with the back-office REST API.
//!
//! This module provides the `ApiClient` struct for the session endpoints:
//! login, current user and organizations.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::models::{Organization, User};

use super::{ApiError, AuthBackend, LoginResponse};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const LOGIN_PATH: &str = "auth/login";
const CURRENT_USER_PATH: &str = "me";
const ORGANIZATIONS_PATH: &str = "organizations";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// API client for the back-office backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        let request = request.header(header::ACCEPT, "application/json");
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Read the body and decode it, reporting shape mismatches as `InvalidResponse`
    async fn decode<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{} from {}", e, url)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "GET");

        let response = Self::authorized(self.client.get(&url), token)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::decode(response, &url).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "POST");

        let response = Self::authorized(self.client.post(&url), token)
            .json(body)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::decode(response, &url).await
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.post(LOGIN_PATH, &LoginRequest { email, password }, None).await
    }

    async fn current_user(&self, token: &str) -> Result<User, ApiError> {
        self.get(CURRENT_USER_PATH, Some(token)).await
    }

    async fn organizations(&self, token: &str) -> Result<Vec<Organization>, ApiError> {
        self.get(ORGANIZATIONS_PATH, Some(token)).await
    }

    async fn organization(&self, token: &str, id: &str) -> Result<Organization, ApiError> {
        let path = format!("{}/{}", ORGANIZATIONS_PATH, urlencoding::encode(id));
        self.get(&path, Some(token)).await
    }
}
