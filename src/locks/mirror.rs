//! Advisory Cross-Process Lock Mirror
//!
//! Lock existence and TTL may be mirrored into an external key-value store
//! keyed by `document:object` so other processes can see them. The mirror
//! is strictly advisory: this process never reads it back to make a
//! correctness decision; the local lock table is authoritative. A real
//! multi-process deployment would need to promote the store to the single
//! source of truth with leases, which changes the acquire/release protocol
//! materially.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// Advisory key-value mirror of lock existence and TTL
pub trait LockMirror: Send + Sync {
    /// Publish a lock entry with a TTL
    fn set(&self, key: &str, value: &str, ttl: Duration);

    /// Remove a lock entry
    fn delete(&self, key: &str);
}

/// Build the mirror key for a `(document, object)` pair
pub fn mirror_key(document: &str, object_id: &str) -> String {
    format!("{}:{}", document, object_id)
}

/// Mirror that publishes nowhere; the default
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMirror;

impl LockMirror for NoopMirror {
    fn set(&self, _key: &str, _value: &str, _ttl: Duration) {}

    fn delete(&self, _key: &str) {}
}

/// In-memory mirror used by tests to observe what would be published
#[derive(Debug, Default)]
pub struct MemoryMirror {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryMirror {
    /// Create an empty mirror
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value for a key
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("mirror lock poisoned")
            .get(key)
            .cloned()
    }

    /// Number of published entries
    pub fn len(&self) -> usize {
        self.entries.lock().expect("mirror lock poisoned").len()
    }

    /// True when nothing is published
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LockMirror for MemoryMirror {
    fn set(&self, key: &str, value: &str, _ttl: Duration) {
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(key.to_string(), value.to_string());
            }
            Err(_) => warn!(key, "mirror set skipped, store poisoned"),
        }
    }

    fn delete(&self, key: &str) {
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.remove(key);
            }
            Err(_) => warn!(key, "mirror delete skipped, store poisoned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_mirror_set_and_delete() {
        let mirror = MemoryMirror::new();
        mirror.set(&mirror_key("doc1", "partA"), "alice", Duration::from_secs(5));
        assert_eq!(mirror.get("doc1:partA").as_deref(), Some("alice"));

        mirror.delete("doc1:partA");
        assert!(mirror.is_empty());
    }
}
