//! The process-local cache tier.
//!
//! A nested mapping partition → group → key. Entries are tagged so that a
//! remote-confirmed-absent key is distinguishable from a legitimately
//! cached `false`-like value: `KnownAbsent` is a marker, not a value.
//!
//! The tier is unbounded and never expires entries on its own; the remote
//! store owns TTL expiry, and the local tier is cleared only by `flush`.

use std::collections::HashMap;

use serde_json::Value;

/// A value held by the local tier.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalEntry {
    /// A cached value.
    Hit(Value),
    /// The remote store confirmed this key absent; skip re-querying it
    /// until the entry is overwritten, deleted, or flushed.
    KnownAbsent,
}

/// Nested partition → group → key mapping.
#[derive(Debug, Default)]
pub struct LocalTier {
    partitions: HashMap<u64, HashMap<String, HashMap<String, LocalEntry>>>,
}

impl LocalTier {
    /// Creates an empty tier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an entry.
    #[must_use]
    pub fn get(&self, partition: u64, group: &str, key: &str) -> Option<&LocalEntry> {
        self.partitions
            .get(&partition)
            .and_then(|groups| groups.get(group))
            .and_then(|entries| entries.get(key))
    }

    /// Looks up an entry for in-place mutation (counter updates).
    pub fn get_mut(&mut self, partition: u64, group: &str, key: &str) -> Option<&mut LocalEntry> {
        self.partitions
            .get_mut(&partition)
            .and_then(|groups| groups.get_mut(group))
            .and_then(|entries| entries.get_mut(key))
    }

    /// Returns whether an entry exists, marker entries included.
    #[must_use]
    pub fn contains(&self, partition: u64, group: &str, key: &str) -> bool {
        self.get(partition, group, key).is_some()
    }

    /// Inserts or overwrites an entry.
    pub fn insert(&mut self, partition: u64, group: &str, key: &str, entry: LocalEntry) {
        self.partitions
            .entry(partition)
            .or_default()
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), entry);
    }

    /// Removes an entry, returning it if present.
    pub fn remove(&mut self, partition: u64, group: &str, key: &str) -> Option<LocalEntry> {
        self.partitions
            .get_mut(&partition)
            .and_then(|groups| groups.get_mut(group))
            .and_then(|entries| entries.remove(key))
    }

    /// Clears every partition, group, and key.
    pub fn clear(&mut self) {
        self.partitions.clear();
    }
}
