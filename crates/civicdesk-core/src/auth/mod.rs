//! Authentication and session state.
//!
//! This module provides:
//! - `TokenStore`: the bearer credential and its JWT-derived expiry
//! - `OrganizationContext`: the active tenant of the session
//! - `SessionContext`: login, logout and silent re-authentication over both
//!
//! All persisted state goes through an injected `Storage` handle.

pub mod error;
pub mod organization;
pub mod session;
pub mod token;

pub use error::{AuthError, LoginFailure};
pub use organization::OrganizationContext;
pub use session::{SessionContext, DEFAULT_PROFILE_TIMEOUT};
pub use token::{is_expired, is_expired_at, Claims, TokenDecodeError, TokenStore};
