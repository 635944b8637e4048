use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    #[serde(deserialize_with = "super::deserialize_id")]
    pub id: String,
    pub name: String,
    pub email: String,
}

impl User {
    /// Name and email for status lines, e.g. `Ana Souza <ana@city.gov>`
    pub fn display(&self) -> String {
        if self.name.trim().is_empty() {
            self.email.clone()
        } else {
            format!("{} <{}>", self.name, self.email)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_with_numeric_id() {
        let json = r#"{"id": 42, "name": "Ana Souza", "email": "ana@city.gov", "role": "admin"}"#;
        let user: User = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert_eq!(user.id, "42");
        assert_eq!(user.display(), "Ana Souza <ana@city.gov>");
    }

    #[test]
    fn test_parse_user_with_uuid_id() {
        let json = r#"{"id": "5f0c7d0e-8a53-4f7e-9a59-0b0f1b2f7f11", "name": "", "email": "ops@city.gov"}"#;
        let user: User = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert_eq!(user.id, "5f0c7d0e-8a53-4f7e-9a59-0b0f1b2f7f11");
        assert_eq!(user.display(), "ops@city.gov");
    }

    #[test]
    fn test_missing_email_is_rejected() {
        let json = r#"{"id": 1, "name": "Nobody"}"#;
        assert!(serde_json::from_str::<User>(json).is_err());
    }
}
