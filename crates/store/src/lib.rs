//! Persistent key/value storage for client-side session state.
//!
//! Values are JSON documents addressed by string keys, optionally carrying an
//! expiry. [`FileStore`] persists to a single JSON file; [`MemoryStore`] keeps
//! everything in process.

pub mod error;
pub mod file;
pub mod memory;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

pub use {
    error::{Error, Result},
    file::FileStore,
    memory::MemoryStore,
};

/// A stored value plus its optional expiry (unix seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl StoredEntry {
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// String-keyed JSON storage shared by every brand on a host.
pub trait KeyValueStore: Send + Sync {
    /// Fetch a live value. Expired entries read as absent.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&self, key: &str, value: Value, expires_at: Option<u64>) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Remove every key, regardless of namespace.
    fn clear_all(&self) -> Result<()>;

    /// Keys of live entries, sorted.
    fn keys(&self) -> Result<Vec<String>>;
}

/// Current time as unix seconds.
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Absolute expiry for an entry written now with the given TTL.
pub fn expiry_after(ttl: Duration) -> u64 {
    now_unix().saturating_add(ttl.as_secs())
}
