//! Key/value persistence abstraction.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Process-wide key/value persistence with optional expiry.
///
/// Abstracts the host's option storage so credentials, tokens, CSRF
/// state, and the path cache can be tested without a live environment.
/// Implementations are infallible by contract: a missing or expired key
/// reads as `None`, and a backend that cannot persist a write should
/// drop it and log rather than surface an error.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. Expired entries read as `None`.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value without expiry, replacing any existing entry.
    fn set(&self, key: &str, value: &str);

    /// Write a value that expires after `ttl`.
    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration);

    /// Remove a value. Removing an absent key is a no-op.
    fn delete(&self, key: &str);
}

struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }
}

/// In-memory store.
///
/// Backs every test, and serves as the process-wide store for hosts
/// that accept losing connection state on restart. Expiry is lazy:
/// entries are dropped when read after their deadline.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        let expired = entries.get(key).map(StoredValue::is_expired).unwrap_or(false);
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|stored| stored.value.clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.lock().unwrap().insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: None,
            },
        );
    }

    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.lock().unwrap().insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
    }

    fn delete(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}
