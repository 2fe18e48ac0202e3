//! Shared license value for self-service activation

use crate::error::{PortalError, Result};
use crate::storage::{KeyValueStore, LICENSE_KEY};

/// Canonical stored form of a license
pub fn normalize_license(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Typed view over the stored license string
pub struct LicenseStore<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
    default_value: &'a str,
}

impl<'a, S: KeyValueStore + ?Sized> LicenseStore<'a, S> {
    pub fn new(store: &'a S, default_value: &'a str) -> Self {
        Self {
            store,
            default_value,
        }
    }

    /// Current license, seeding the default on first read
    pub async fn current(&self) -> Result<String> {
        if let Some(value) = self.store.get(LICENSE_KEY).await? {
            let value = normalize_license(&value);
            if !value.is_empty() {
                return Ok(value);
            }
        }
        let seeded = normalize_license(self.default_value);
        self.store.put(LICENSE_KEY, seeded.clone()).await?;
        Ok(seeded)
    }

    /// Replace the license
    pub async fn set(&self, value: &str) -> Result<String> {
        let value = normalize_license(value);
        if value.is_empty() {
            return Err(PortalError::Validation("license must not be empty".into()));
        }
        self.store.put(LICENSE_KEY, value.clone()).await?;
        Ok(value)
    }

    /// Case-insensitive comparison of user input against the license
    pub async fn matches(&self, input: &str) -> Result<bool> {
        let input = normalize_license(input);
        if input.is_empty() {
            return Ok(false);
        }
        Ok(input == self.current().await?)
    }
}
