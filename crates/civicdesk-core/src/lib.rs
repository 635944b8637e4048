//! Session core for the civicdesk municipal back-office client.
//!
//! - `auth`: token store, organization context and the session context
//! - `guard`: navigation guard over the protected path prefix
//! - `api`: REST client for login, profile and organizations
//! - `storage`: persistence adapters for session state
//! - `config`: client configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod models;
pub mod storage;

pub use api::{ApiClient, ApiError, AuthBackend};
pub use auth::{AuthError, SessionContext};
pub use config::Config;
pub use guard::{AuthGuard, Decision, Navigator};
pub use models::{Organization, User};
