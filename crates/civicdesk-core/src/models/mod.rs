//! Data models for the back-office session.
//!
//! - `User`: the authenticated principal returned by `GET me`
//! - `Organization`: the tenant a session is scoped to

pub mod organization;
pub mod user;

pub use organization::Organization;
pub use user::User;

use serde::{Deserialize, Deserializer};

/// Backend identifiers arrive as either JSON numbers or strings depending on
/// the table; normalize both to a string.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}
