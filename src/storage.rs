//! Key-value persistence
//!
//! Accounts, sessions and the license value live under three keys of one
//! KV namespace. Everything above this module talks to [`KeyValueStore`],
//! so the same lifecycle code runs against Workers KV in production and
//! against [`MemoryStore`] in tests.

use std::cell::RefCell;
use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{PortalError, Result};

/// KV key holding the account map (normalized email -> account)
pub const ACCOUNTS_KEY: &str = "axq_users_db";

/// KV key holding the session map (token digest -> session)
pub const SESSIONS_KEY: &str = "axq_sessions";

/// KV key holding the plain license string
pub const LICENSE_KEY: &str = "axq_master_license";

/// Minimal string key-value interface
#[async_trait(?Send)]
pub trait KeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: String) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Read a JSON value, `None` when the key is absent
pub async fn read_json<S, T>(store: &S, key: &str) -> Result<Option<T>>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize and write a JSON value
pub async fn write_json<S, T>(store: &S, key: &str, value: &T) -> Result<()>
where
    S: KeyValueStore + ?Sized,
    T: Serialize,
{
    store.put(key, serde_json::to_string(value)?).await
}

/// Workers KV namespace
pub struct KvBackend {
    kv: worker::kv::KvStore,
}

impl KvBackend {
    /// Bind to the `STATE` namespace
    pub fn from_env(env: &worker::Env) -> Result<Self> {
        Ok(Self { kv: env.kv("STATE")? })
    }
}

#[async_trait(?Send)]
impl KeyValueStore for KvBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.kv
            .get(key)
            .text()
            .await
            .map_err(|e| PortalError::Storage(format!("get {key}: {e}")))
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.kv
            .put(key, value)
            .map_err(|e| PortalError::Storage(format!("put {key}: {e}")))?
            .execute()
            .await
            .map_err(|e| PortalError::Storage(format!("put {key}: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.kv
            .delete(key)
            .await
            .map_err(|e| PortalError::Storage(format!("delete {key}: {e}")))
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Raw value, for inspecting what was persisted
    pub(crate) fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    /// Overwrite a raw value, bypassing serialization
    pub(crate) fn set_raw(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }
}

/// Memory store whose operations can be switched to fail like a KV outage
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    failing: std::cell::Cell<bool>,
}

#[cfg(test)]
impl FlakyStore {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    fn check(&self, op: &str, key: &str) -> Result<()> {
        if self.failing.get() {
            return Err(PortalError::Storage(format!("{op} {key}: timed out")));
        }
        Ok(())
    }
}

#[cfg(test)]
#[async_trait(?Send)]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check("get", key)?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.check("put", key)?;
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check("delete", key)?;
        self.inner.delete(key).await
    }
}

#[async_trait(?Send)]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.entries.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}
