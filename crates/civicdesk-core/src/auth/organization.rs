use tracing::{debug, warn};

use crate::models::Organization;
use crate::storage::{Storage, ORGANIZATION_KEY};

/// The tenant the current session is scoped to.
pub struct OrganizationContext<S> {
    storage: S,
    active: Option<Organization>,
}

impl<S: Storage> OrganizationContext<S> {
    /// Restore the persisted organization. A blob that no longer parses is
    /// dropped and treated as no organization.
    pub fn load(storage: S) -> Self {
        let active = match storage.load(ORGANIZATION_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Organization>(&raw) {
                Ok(org) => Some(org),
                Err(e) => {
                    warn!(error = %e, "Discarding unparsable stored organization");
                    if let Err(e) = storage.clear(ORGANIZATION_KEY) {
                        warn!(error = %e, "Failed to remove stored organization");
                    }
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored organization");
                None
            }
        };
        debug!(organization = ?active.as_ref().map(|o| &o.id), "Organization context loaded");
        Self { storage, active }
    }

    pub fn active(&self) -> Option<&Organization> {
        self.active.as_ref()
    }

    /// Replace the active organization and persist it.
    pub fn set_active(&mut self, organization: Organization) -> &Organization {
        let active = self.active.insert(organization);
        match serde_json::to_string(&*active) {
            Ok(blob) => {
                if let Err(e) = self.storage.save(ORGANIZATION_KEY, &blob) {
                    warn!(error = %e, "Failed to persist organization");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize organization"),
        }
        active
    }

    pub fn clear(&mut self) {
        self.active = None;
        if let Err(e) = self.storage.clear(ORGANIZATION_KEY) {
            warn!(error = %e, "Failed to remove stored organization");
        }
    }

    /// Tenant data endpoint of the active organization. `None` when there is
    /// no organization or its metadata does not name one.
    pub fn resolve_data_endpoint(&self) -> Option<String> {
        let org = self.active.as_ref()?;
        match org.data_endpoint() {
            Ok(endpoint) => endpoint,
            Err(e) => {
                debug!(error = %e, "No data endpoint for organization");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    use crate::storage::MemoryStorage;

    fn org(metadata: &str) -> Organization {
        Organization {
            id: "12".to_string(),
            name: "Secretaria de Saude".to_string(),
            metadata: Some(Value::String(metadata.to_string())),
        }
    }

    #[test]
    fn test_resolve_data_endpoint() {
        let mut ctx = OrganizationContext::load(MemoryStorage::new());
        assert_eq!(ctx.resolve_data_endpoint(), None);

        ctx.set_active(org(r#"{"postgrest": "https://saude.city.gov/rest"}"#));
        assert_eq!(
            ctx.resolve_data_endpoint().as_deref(),
            Some("https://saude.city.gov/rest")
        );

        ctx.set_active(org("not-json"));
        assert_eq!(ctx.resolve_data_endpoint(), None);
    }

    #[test]
    fn test_set_active_replaces_and_persists() {
        let storage = MemoryStorage::new();
        let mut ctx = OrganizationContext::load(storage.clone());

        ctx.set_active(org("{}"));
        let mut second = org(r#"{"postgrest": "https://b/rest"}"#);
        second.id = "13".to_string();
        ctx.set_active(second.clone());
        assert_eq!(ctx.active(), Some(&second));

        let restored = OrganizationContext::load(storage);
        assert_eq!(restored.active(), Some(&second));
    }

    #[test]
    fn test_clear_removes_persisted_blob() {
        let storage = MemoryStorage::new();
        let mut ctx = OrganizationContext::load(storage.clone());
        ctx.set_active(org("{}"));

        ctx.clear();
        assert_eq!(ctx.active(), None);
        assert_eq!(storage.load(ORGANIZATION_KEY).unwrap(), None);
    }

    #[test]
    fn test_corrupt_blob_is_treated_as_absent() {
        let storage = MemoryStorage::new();
        storage.save(ORGANIZATION_KEY, "{ this is not json").unwrap();

        let ctx = OrganizationContext::load(storage.clone());
        assert_eq!(ctx.active(), None);
        assert_eq!(storage.load(ORGANIZATION_KEY).unwrap(), None);
    }
}
