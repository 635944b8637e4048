//! Durable key-value persistence for session state.
//!
//! All session state goes through the [`Storage`] trait so the stores never
//! touch the filesystem or keychain directly. Three implementations exist:
//!
//! - `FileStorage`: one file per key under the session directory
//! - `KeyringStorage`: OS keychain entries via keyring
//! - `MemoryStorage`: process-local map, used by tests
//!
//! Implementations are cheap handles: cloning one yields another handle to
//! the same underlying store.

pub mod file;
pub mod keychain;
pub mod memory;

use std::sync::Arc;

use anyhow::Result;

pub use file::FileStorage;
pub use keychain::KeyringStorage;
pub use memory::MemoryStorage;

/// Storage key for the raw bearer token
pub const TOKEN_KEY: &str = "auth_token";

/// Storage key for the JSON-serialized active organization
pub const ORGANIZATION_KEY: &str = "auth/organization";

pub trait Storage {
    /// Read the value stored under `key`, `None` if nothing is stored.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn clear(&self, key: &str) -> Result<()>;
}

impl<T: Storage + ?Sized> Storage for Arc<T> {
    fn load(&self, key: &str) -> Result<Option<String>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        (**self).save(key, value)
    }

    fn clear(&self, key: &str) -> Result<()> {
        (**self).clear(key)
    }
}

/// Shared, type-erased storage handle chosen at runtime from configuration
pub type SharedStorage = Arc<dyn Storage + Send + Sync>;
