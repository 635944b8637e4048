//! REST API client module for the back-office backend.
//!
//! This module provides the `AuthBackend` seam the session layer talks to,
//! and `ApiClient`, its HTTP implementation.
//!
//! The backend uses JWT bearer token authentication obtained through
//! `POST auth/login`.

pub mod client;
pub mod error;

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{Organization, User};

pub use client::ApiClient;
pub use error::ApiError;

/// Body of a successful `POST auth/login`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// `POST auth/login {email, password}`
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;

    /// `GET me` with the given bearer token
    async fn current_user(&self, token: &str) -> Result<User, ApiError>;

    /// `GET organizations`
    async fn organizations(&self, token: &str) -> Result<Vec<Organization>, ApiError>;

    /// `GET organizations/{id}`
    async fn organization(&self, token: &str, id: &str) -> Result<Organization, ApiError>;
}
