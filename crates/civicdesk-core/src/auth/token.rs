use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::storage::{Storage, TOKEN_KEY};

/// Buffer time before expiry to trigger refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

#[derive(Error, Debug)]
pub enum TokenDecodeError {
    #[error("token does not have three dot-separated segments")]
    Malformed,

    #[error("claims segment is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("claims segment is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("claims do not carry a numeric exp")]
    MissingExpiry,

    #[error("exp {0} is outside the representable range")]
    ExpiryOutOfRange(f64),
}

/// The parts of a JWT payload the session cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    /// Raw `exp` claim, seconds since the epoch (may be fractional)
    pub exp: f64,
    /// `exp` truncated to whole milliseconds
    pub expires_at: DateTime<Utc>,
    pub subject: Option<String>,
}

impl Claims {
    /// Decode the middle segment of `header.payload.signature`.
    ///
    /// The signature is not verified; the backend does that on every request.
    pub fn decode(token: &str) -> Result<Self, TokenDecodeError> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => return Err(TokenDecodeError::Malformed),
        };

        let claims: Value = serde_json::from_slice(&decode_segment(payload)?)?;

        let exp = claims
            .get("exp")
            .and_then(Value::as_f64)
            .ok_or(TokenDecodeError::MissingExpiry)?;
        let millis = exp * 1000.0;
        if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
            return Err(TokenDecodeError::ExpiryOutOfRange(exp));
        }
        let expires_at = DateTime::from_timestamp_millis(millis as i64)
            .ok_or(TokenDecodeError::ExpiryOutOfRange(exp))?;

        Ok(Self {
            exp,
            expires_at,
            subject: claims.get("sub").and_then(Value::as_str).map(str::to_string),
        })
    }
}

/// Decode a base64 segment written with either alphabet, padded or not.
fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let normalized: String = segment
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();
    URL_SAFE_NO_PAD.decode(normalized)
}

/// Whether `token` is unusable at `now`: absent, undecodable, or past its `exp`.
pub fn is_expired_at(token: Option<&str>, now: DateTime<Utc>) -> bool {
    let Some(token) = token else {
        return true;
    };
    match Claims::decode(token) {
        Ok(claims) => claims.exp * 1000.0 <= now.timestamp_millis() as f64,
        Err(e) => {
            debug!(error = %e, "Token payload undecodable, treating as expired");
            true
        }
    }
}

pub fn is_expired(token: Option<&str>) -> bool {
    is_expired_at(token, Utc::now())
}

/// Holds the bearer token and mirrors every change into storage.
pub struct TokenStore<S> {
    storage: S,
    token: Option<String>,
}

impl<S: Storage> TokenStore<S> {
    /// Restore the token persisted by a previous run, if any.
    pub fn load(storage: S) -> Self {
        let token = match storage.load(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                None
            }
        };
        debug!(has_token = token.is_some(), "Token store loaded");
        Self { storage, token }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_credential(&mut self, token: String) {
        let token = self.token.insert(token);
        if let Err(e) = self.storage.save(TOKEN_KEY, token.as_str()) {
            warn!(error = %e, "Failed to persist token");
        }
    }

    pub fn clear(&mut self) {
        self.token = None;
        if let Err(e) = self.storage.clear(TOKEN_KEY) {
            warn!(error = %e, "Failed to remove stored token");
        }
    }

    /// Token present and not expired
    pub fn is_live(&self) -> bool {
        !is_expired(self.token())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.token()
            .and_then(|t| Claims::decode(t).ok())
            .map(|c| c.expires_at)
    }

    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at().map(|at| at - Utc::now())
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.time_until_expiry().map(|d| d.num_minutes().max(0))
    }

    /// Check if the token will expire soon and the user should sign in again
    pub fn needs_refresh(&self) -> bool {
        match self.time_until_expiry() {
            Some(remaining) => remaining < Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES),
            None => self.token.is_some(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    use crate::storage::MemoryStorage;

    /// Build an unsigned JWT carrying `claims`
    pub(crate) fn jwt(claims: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{}.{}.signature", header, payload)
    }

    pub(crate) fn jwt_expiring_in(delta: Duration) -> String {
        jwt(&serde_json::json!({ "sub": "1", "exp": (Utc::now() + delta).timestamp() }))
    }

    #[test]
    fn test_absent_token_is_expired() {
        assert!(is_expired(None));
    }

    #[test]
    fn test_future_and_past_exp() {
        assert!(!is_expired(Some(&jwt_expiring_in(Duration::hours(1)))));
        assert!(is_expired(Some(&jwt_expiring_in(Duration::hours(-1)))));
    }

    #[test]
    fn test_exp_boundary_is_expired() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = jwt(&serde_json::json!({ "exp": 1_700_000_000 }));
        assert!(is_expired_at(Some(&token), now));
        assert!(!is_expired_at(Some(&token), now - Duration::milliseconds(1)));
    }

    #[test]
    fn test_fractional_exp() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = jwt(&serde_json::json!({ "exp": 1_700_000_000.5 }));
        assert!(!is_expired_at(Some(&token), now));
    }

    #[test]
    fn test_sub_millisecond_exp_is_not_truncated() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let token = jwt(&serde_json::json!({ "exp": 1_700_000_000.0005 }));
        assert!(!is_expired_at(Some(&token), now));
        assert!(is_expired_at(Some(&token), now + Duration::milliseconds(1)));
    }

    #[test]
    fn test_undecodable_tokens_are_expired() {
        let cases = [
            String::new(),
            "opaque-session-id".to_string(),
            "a.b".to_string(),
            "a.b.c.d".to_string(),
            "a.!!!.c".to_string(),
            format!("a.{}.c", URL_SAFE_NO_PAD.encode("not json")),
            jwt(&serde_json::json!({ "sub": "1" })),
            jwt(&serde_json::json!({ "exp": "tomorrow" })),
            jwt(&serde_json::json!({ "exp": null })),
            jwt(&serde_json::json!({ "exp": 1e300 })),
        ];
        for token in &cases {
            assert!(is_expired(Some(token)), "expected expired: {:?}", token);
        }
    }

    #[test]
    fn test_standard_alphabet_payload_is_accepted() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let payload = STANDARD.encode(serde_json::json!({ "exp": exp, "sub": "9" }).to_string());
        let token = format!("h.{}.s", payload);

        let claims = Claims::decode(&token).expect("standard base64 should decode");
        assert_eq!(claims.expires_at.timestamp(), exp);
        assert_eq!(claims.subject.as_deref(), Some("9"));
    }

    #[test]
    fn test_set_and_clear_persist() {
        let storage = MemoryStorage::new();
        let mut store = TokenStore::load(storage.clone());
        assert_eq!(store.token(), None);

        let token = jwt_expiring_in(Duration::hours(2));
        store.set_credential(token.clone());
        assert_eq!(storage.load(TOKEN_KEY).unwrap().as_deref(), Some(token.as_str()));
        assert!(store.is_live());
        assert!(!store.needs_refresh());
        assert!(store.minutes_until_expiry().unwrap() >= 119);

        store.clear();
        assert_eq!(store.token(), None);
        assert_eq!(storage.load(TOKEN_KEY).unwrap(), None);
        store.clear();
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_load_restores_persisted_token() {
        let storage = MemoryStorage::new();
        storage.save(TOKEN_KEY, "persisted.token.value").unwrap();

        let store = TokenStore::load(storage);
        assert_eq!(store.token(), Some("persisted.token.value"));
        assert!(!store.is_live());
        assert!(store.needs_refresh());
    }

    #[test]
    fn test_needs_refresh_near_expiry() {
        let mut store = TokenStore::load(MemoryStorage::new());
        store.set_credential(jwt_expiring_in(Duration::minutes(3)));
        assert!(store.is_live());
        assert!(store.needs_refresh());
    }
}
