use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{AuthError, AuthResult};

/// Auxiliary key-value store the auth library may use for rate limiting
/// and other short-lived data, independent of the primary database.
#[async_trait]
pub trait SecondaryStorage: Send + Sync {
    /// Get a value by key. Expired entries read as missing.
    async fn get(&self, key: &str) -> AuthResult<Option<String>>;

    /// Store a value, optionally expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AuthResult<()>;

    /// Delete a value by key.
    async fn delete(&self, key: &str) -> AuthResult<()>;
}

/// In-memory secondary storage for testing and development
#[derive(Clone, Default)]
pub struct MemoryStorage {
    data: Arc<Mutex<HashMap<String, StorageEntry>>>,
}

#[derive(Debug, Clone)]
struct StorageEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl StorageEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> AuthResult<usize> {
        let now = Utc::now();
        Ok(self.lock()?.values().filter(|e| e.is_live(now)).count())
    }

    pub fn is_empty(&self) -> AuthResult<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> AuthResult<MutexGuard<'_, HashMap<String, StorageEntry>>> {
        self.data
            .lock()
            .map_err(|_| AuthError::storage("memory storage lock poisoned"))
    }
}

#[async_trait]
impl SecondaryStorage for MemoryStorage {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        let mut data = self.lock()?;
        let now = Utc::now();
        data.retain(|_, entry| entry.is_live(now));

        Ok(data.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AuthResult<()> {
        let entry = StorageEntry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Utc::now() + ttl),
        };

        let mut data = self.lock()?;
        let now = Utc::now();
        data.retain(|_, entry| entry.is_live(now));
        data.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> AuthResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
