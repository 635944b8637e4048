//! Navigation guard.
//!
//! Every navigation is evaluated afresh: the session is re-initialized, then
//! the requested path is checked against the protected prefix. Paths outside
//! the prefix are always allowed; paths inside it need a signed-in user and
//! otherwise redirect to the public entry path.

use tracing::{debug, warn};

use crate::api::AuthBackend;
use crate::auth::SessionContext;
use crate::config::Config;
use crate::storage::Storage;

pub const DEFAULT_PROTECTED_PREFIX: &str = "/admin";
pub const DEFAULT_PUBLIC_PATH: &str = "/auth";

/// Outcome of one navigation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied { redirect: String },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// The router side of a navigation. The guard calls exactly one of these
/// per navigation.
pub trait Navigator {
    fn proceed(&mut self, path: &str);
    fn redirect(&mut self, path: &str);
}

#[derive(Debug, Clone)]
pub struct AuthGuard {
    protected_prefix: String,
    public_path: String,
}

impl AuthGuard {
    pub fn new(protected_prefix: impl Into<String>, public_path: impl Into<String>) -> Self {
        let protected_prefix = protected_prefix.into();
        let guard = Self {
            protected_prefix: protected_prefix.trim_end_matches('/').to_string(),
            public_path: public_path.into(),
        };
        if guard.redirects_into_protected() {
            warn!(
                protected_prefix = %protected_prefix,
                public_path = %guard.public_path,
                "Public path is itself protected; denied navigations will be denied again"
            );
        }
        guard
    }

    /// Whether the redirect target falls under the protected prefix
    pub fn redirects_into_protected(&self) -> bool {
        self.is_protected(&self.public_path)
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.protected_prefix.clone(), config.public_path.clone())
    }

    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    /// Whether `path` lies in the protected namespace. Matching is per path
    /// segment, so `/admin` covers `/admin/x` but not `/administrator`.
    pub fn is_protected(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let prefix = self.protected_prefix.as_str();
        if prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Decide a navigation given whether a session is present.
    pub fn decide(&self, path: &str, session_present: bool) -> Decision {
        if !self.is_protected(path) || session_present {
            Decision::Allowed
        } else {
            Decision::Denied {
                redirect: self.public_path.clone(),
            }
        }
    }

    /// Re-initialize the session, then decide. Suspends until the profile
    /// fetch settles or times out.
    pub async fn evaluate<B, S>(&self, session: &mut SessionContext<B, S>, path: &str) -> Decision
    where
        B: AuthBackend,
        S: Storage + Clone,
    {
        session.initialize().await;
        let decision = self.decide(path, session.user().is_some());
        debug!(path, ?decision, "Navigation evaluated");
        decision
    }

    /// Evaluate a navigation and hand the result to the router.
    pub async fn navigate<B, S, N>(
        &self,
        session: &mut SessionContext<B, S>,
        path: &str,
        navigator: &mut N,
    ) -> Decision
    where
        B: AuthBackend,
        S: Storage + Clone,
        N: Navigator + ?Sized,
    {
        let decision = self.evaluate(session, path).await;
        match &decision {
            Decision::Allowed => navigator.proceed(path),
            Decision::Denied { redirect } => navigator.redirect(redirect),
        }
        decision
    }
}

impl Default for AuthGuard {
    fn default() -> Self {
        Self::new(DEFAULT_PROTECTED_PREFIX, DEFAULT_PUBLIC_PATH)
    }
}
