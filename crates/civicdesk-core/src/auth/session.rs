use std::time::Duration;

use tracing::{debug, info, warn};

use crate::api::{AuthBackend, LoginResponse};
use crate::models::{Organization, User};
use crate::storage::Storage;

use super::{AuthError, LoginFailure, OrganizationContext, TokenStore};

/// Upper bound on the silent profile fetch during `initialize`.
/// A hung backend must not hold navigation forever.
pub const DEFAULT_PROFILE_TIMEOUT: Duration = Duration::from_secs(10);

/// Session state for one signed-in client: token, profile and tenant.
///
/// Token, user and organization change together: after any public call
/// either the user is set and the token is present, or neither is.
pub struct SessionContext<B, S> {
    backend: B,
    tokens: TokenStore<S>,
    organization: OrganizationContext<S>,
    user: Option<User>,
    profile_timeout: Duration,
}

impl<B: AuthBackend, S: Storage + Clone> SessionContext<B, S> {
    /// Build a context from persisted state. The profile is not fetched
    /// until `initialize` runs.
    pub fn create(backend: B, storage: S) -> Self {
        Self {
            backend,
            tokens: TokenStore::load(storage.clone()),
            organization: OrganizationContext::load(storage),
            user: None,
            profile_timeout: DEFAULT_PROFILE_TIMEOUT,
        }
    }

    pub fn with_profile_timeout(mut self, timeout: Duration) -> Self {
        self.profile_timeout = timeout;
        self
    }

    /// Drop in-memory state. Persisted state is kept for the next run;
    /// use `logout` to invalidate it.
    pub fn teardown(self) -> B {
        debug!(signed_in = self.user.is_some(), "Session context torn down");
        self.backend
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn token(&self) -> Option<&str> {
        self.tokens.token()
    }

    pub fn tokens(&self) -> &TokenStore<S> {
        &self.tokens
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn organization(&self) -> Option<&Organization> {
        self.organization.active()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    // =========================================================================
    // Silent re-authentication
    // =========================================================================

    /// Materialize the current identity from the stored token.
    ///
    /// Fails closed: a missing or expired token, or any profile fetch failure
    /// (including timeout), leaves the session fully logged out.
    pub async fn initialize(&mut self) {
        if !self.tokens.is_live() {
            if self.tokens.token().is_some() {
                info!("Stored token expired, signing out");
            }
            self.logout();
            return;
        }

        match self.fetch_profile_bounded().await {
            Ok(user) => {
                debug!(user = %user.id, "Session restored");
                self.user = Some(user);
            }
            Err(e) => {
                warn!(error = %e, "Could not restore session, signing out");
                self.logout();
            }
        }
    }

    async fn fetch_profile_bounded(&self) -> Result<User, AuthError> {
        tokio::time::timeout(self.profile_timeout, self.fetch_profile())
            .await
            .map_err(|_| AuthError::ProfileTimeout(self.profile_timeout))?
    }

    /// `GET me` with the stored token.
    pub async fn fetch_profile(&self) -> Result<User, AuthError> {
        let token = self.tokens.token().ok_or(AuthError::NotAuthenticated)?;
        self.profile_for(token).await
    }

    async fn profile_for(&self, token: &str) -> Result<User, AuthError> {
        self.backend
            .current_user(token)
            .await
            .map_err(AuthError::from_profile_error)
    }

    // =========================================================================
    // Explicit user actions
    // =========================================================================

    /// Sign in and load the profile for the new token.
    ///
    /// Nothing is committed unless both the login and the profile fetch
    /// succeed; on error the session is exactly as before the call.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<User, AuthError> {
        let LoginResponse { token } = self
            .backend
            .login(email, password)
            .await
            .map_err(LoginFailure::Rejected)?;

        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or(LoginFailure::MissingToken)?;

        let user = self
            .profile_for(&token)
            .await
            .map_err(|e| LoginFailure::Profile(Box::new(e)))?;

        if super::is_expired(Some(&token)) {
            warn!("Backend issued a token without a usable expiry");
        }

        // A different principal must not inherit the previous tenant
        if self.user.as_ref().map(|u| &u.id) != Some(&user.id) && self.organization.active().is_some() {
            debug!("Clearing organization left by a previous session");
            self.organization.clear();
        }

        self.tokens.set_credential(token);
        self.user = Some(user.clone());
        info!(user = %user.id, "Login successful");
        Ok(user)
    }

    /// Invalidate token, profile and organization together.
    pub fn logout(&mut self) {
        self.tokens.clear();
        self.user = None;
        self.organization.clear();
        debug!("Session cleared");
    }

    /// Organizations visible to the signed-in user
    pub async fn organizations(&self) -> Result<Vec<Organization>, AuthError> {
        let token = self.tokens.token().ok_or(AuthError::NotAuthenticated)?;
        Ok(self.backend.organizations(token).await?)
    }

    /// Fetch organization `id` from the backend and make it the active tenant.
    pub async fn switch_organization(&mut self, id: &str) -> Result<&Organization, AuthError> {
        if self.user.is_none() {
            return Err(AuthError::NotAuthenticated);
        }
        let token = self.tokens.token().ok_or(AuthError::NotAuthenticated)?;
        let organization = self.backend.organization(token, id).await?;
        info!(organization = %organization.id, "Switched organization");
        Ok(self.set_organization(organization))
    }

    /// Make `organization` the active tenant.
    pub fn set_organization(&mut self, organization: Organization) -> &Organization {
        self.organization.set_active(organization)
    }

    /// Tenant data endpoint of the active organization, if resolvable.
    pub fn resolve_data_endpoint(&self) -> Option<String> {
        self.organization.resolve_data_endpoint()
    }
}
