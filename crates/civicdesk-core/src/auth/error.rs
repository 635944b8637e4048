use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Profile request failed with status {status}")]
    AuthFetchFailed { status: StatusCode },

    #[error("Profile response could not be decoded: {0}")]
    AuthDecodeFailed(String),

    #[error("Profile request timed out after {0:?}")]
    ProfileTimeout(Duration),

    #[error("Login failed: {0}")]
    LoginFailed(#[from] LoginFailure),

    #[error("Metadata of organization {organization} is unparsable: {reason}")]
    OrganizationMetadataUnparsable { organization: String, reason: String },

    #[error("Request failed: {0}")]
    Api(#[from] ApiError),
}

/// Why a login attempt was refused
#[derive(Error, Debug)]
pub enum LoginFailure {
    #[error("{0}")]
    Rejected(#[source] ApiError),

    #[error("response did not include a token")]
    MissingToken,

    #[error("profile for the new token could not be loaded: {0}")]
    Profile(#[source] Box<AuthError>),
}

impl AuthError {
    /// Classify a failed `GET me`: HTTP statuses become `AuthFetchFailed`,
    /// undecodable bodies `AuthDecodeFailed`, transport errors stay `Api`.
    pub(crate) fn from_profile_error(err: ApiError) -> Self {
        if let ApiError::InvalidResponse(reason) = err {
            return AuthError::AuthDecodeFailed(reason);
        }
        match err.status() {
            Some(status) => AuthError::AuthFetchFailed { status },
            None => AuthError::Api(err),
        }
    }

    /// Whether this is a rejected login due to bad credentials
    pub fn is_bad_credentials(&self) -> bool {
        matches!(
            self,
            AuthError::LoginFailed(LoginFailure::Rejected(
                ApiError::Unauthorized | ApiError::AccessDenied(_)
            ))
        )
    }
}
