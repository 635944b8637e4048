use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::AuthError;

/// Metadata key naming the tenant's data-access endpoint
const DATA_ENDPOINT_KEY: &str = "postgrest";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Organization {
    #[serde(deserialize_with = "super::deserialize_id")]
    pub id: String,
    pub name: String,
    /// Tenant metadata. The backend stores it as a JSON-encoded string;
    /// some endpoints return it already expanded into an object.
    #[serde(default)]
    #[cfg_attr(feature = "ts", ts(type = "unknown"))]
    pub metadata: Option<Value>,
}

impl Organization {
    /// Parse the metadata into a JSON object.
    pub fn metadata_document(&self) -> Result<Map<String, Value>, AuthError> {
        let unparsable = |reason: String| AuthError::OrganizationMetadataUnparsable {
            organization: self.id.clone(),
            reason,
        };

        match &self.metadata {
            None | Some(Value::Null) => Err(unparsable("no metadata".to_string())),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(other) => Err(unparsable(format!("expected an object, got {}", json_kind(&other)))),
                Err(e) => Err(unparsable(e.to_string())),
            },
            Some(other) => Err(unparsable(format!("expected an object, got {}", json_kind(other)))),
        }
    }

    /// Tenant data endpoint from the metadata, if one is configured.
    pub fn data_endpoint(&self) -> Result<Option<String>, AuthError> {
        let document = self.metadata_document()?;
        Ok(document
            .get(DATA_ENDPOINT_KEY)
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
