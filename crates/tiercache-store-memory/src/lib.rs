//! In-memory backend for the tiercache remote store.
//!
//! Mirrors the observable semantics of the Redis backend (per-key TTL,
//! counter commands, glob key scan, fail-closed disconnection) without a
//! server. Useful as a standalone single-process backend and as the
//! backend double for cache engine tests.
//!
//! The store clones cheaply: all clones share one underlying state, so a
//! test can keep a handle while the engine owns a boxed clone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tiercache_store::{RemoteStore, StoreError};

#[derive(Debug, Clone)]
struct Stored {
    value: Value,
    expires_at: Option<Instant>,
}

impl Stored {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[derive(Debug)]
struct State {
    entries: HashMap<String, Stored>,
    connected: bool,
    failing: bool,
}

/// In-memory [`RemoteStore`] with shared state across clones.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Creates a new, empty, connected store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                entries: HashMap::new(),
                connected: true,
                failing: false,
            })),
        }
    }

    /// Makes subsequent commands fail with a transport error.
    ///
    /// The first failing command flips the store to disconnected, exactly
    /// like a real transport failure would.
    pub fn fail_commands(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Returns whether a live (non-expired) entry exists, bypassing the
    /// connected/failing gates. Inspection only.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock()
            .entries
            .get(key)
            .is_some_and(|stored| !stored.is_expired())
    }

    /// Returns the number of live entries. Inspection only.
    pub fn len(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|stored| !stored.is_expired())
            .count()
    }

    /// Returns `true` if the store holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock means a test panicked mid-call; propagating the
        // panic is the right outcome there.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Checks the disconnect gate and the fault-injection flag.
    fn check(state: &mut State, op: &str) -> Result<(), StoreError> {
        if !state.connected {
            return Err(StoreError::Disconnected);
        }
        if state.failing {
            state.connected = false;
            tracing::warn!(op = %op, "injected failure, disconnecting");
            return Err(StoreError::command(format!("injected failure during {op}")));
        }
        Ok(())
    }

    /// Removes the entry if expired, then returns whether it is live.
    fn live(state: &mut State, key: &str) -> bool {
        if state.entries.get(key).is_some_and(Stored::is_expired) {
            state.entries.remove(key);
        }
        state.entries.contains_key(key)
    }

    fn apply_delta(state: &mut State, key: &str, delta: i64) -> Result<(), StoreError> {
        let base = if Self::live(state, key) {
            match state.entries.get(key).and_then(|s| s.value.as_i64()) {
                Some(n) => n,
                None => {
                    // Same contract as Redis INCRBY on a non-integer value.
                    state.connected = false;
                    return Err(StoreError::command(format!(
                        "value at {key} is not an integer"
                    )));
                }
            }
        } else {
            0
        };
        state.entries.insert(
            key.to_string(),
            Stored {
                value: Value::from(base + delta),
                expires_at: None,
            },
        );
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&mut self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut state = self.lock();
        Self::check(&mut state, "GET")?;
        if !Self::live(&mut state, key) {
            return Ok(None);
        }
        Ok(state.entries.get(key).map(|stored| stored.value.clone()))
    }

    async fn set_with_ttl(
        &mut self,
        key: &str,
        value: &Value,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        Self::check(&mut state, "SET")?;
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        };
        state.entries.insert(
            key.to_string(),
            Stored {
                value: value.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        Self::check(&mut state, "DEL")?;
        state.entries.remove(key);
        Ok(())
    }

    async fn exists(&mut self, key: &str) -> Result<bool, StoreError> {
        let mut state = self.lock();
        Self::check(&mut state, "EXISTS")?;
        Ok(Self::live(&mut state, key))
    }

    async fn incr_by(&mut self, key: &str, delta: i64) -> Result<(), StoreError> {
        let mut state = self.lock();
        Self::check(&mut state, "INCRBY")?;
        Self::apply_delta(&mut state, key, delta)
    }

    async fn decr_by(&mut self, key: &str, delta: i64) -> Result<(), StoreError> {
        let mut state = self.lock();
        Self::check(&mut state, "DECRBY")?;
        Self::apply_delta(&mut state, key, -delta)
    }

    async fn scan_keys(&mut self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut state = self.lock();
        Self::check(&mut state, "SCAN")?;
        state.entries.retain(|_, stored| !stored.is_expired());
        Ok(state
            .entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect())
    }

    async fn close(&mut self) {
        self.lock().connected = false;
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Matches a key against a glob pattern where `*` matches any run of
/// characters. This covers the `prefix:partition:*` patterns the cache
/// engine uses for flush, plus arbitrary `*` placement.
fn glob_match(pattern: &str, key: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == key;
    }
    let segments: Vec<&str> = pattern.split('*').collect();
    let first = segments[0];
    let last = segments[segments.len() - 1];

    if !key.starts_with(first) {
        return false;
    }
    let mut pos = first.len();

    for segment in &segments[1..segments.len() - 1] {
        if segment.is_empty() {
            continue;
        }
        match key[pos..].find(segment) {
            Some(offset) => pos = pos + offset + segment.len(),
            None => return false,
        }
    }

    if last.is_empty() {
        // Pattern ends with '*'; everything matched so far.
        return true;
    }
    key.len() >= pos + last.len() && key.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.backend_name(), "memory");
        store
            .set_with_ttl("k", &json!({"a": 1}), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let mut store = MemoryStore::new();
        store
            .set_with_ttl("k", &json!("v"), Duration::from_millis(1))
            .await
            .unwrap();
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_counters_start_from_zero() {
        let mut store = MemoryStore::new();
        store.incr_by("n", 5).await.unwrap();
        store.decr_by("n", 2).await.unwrap();
        assert_eq!(store.get("n").await.unwrap(), Some(json!(3)));
    }

    #[tokio::test]
    async fn test_incr_on_non_integer_disconnects() {
        let mut store = MemoryStore::new();
        store
            .set_with_ttl("s", &json!("text"), Duration::ZERO)
            .await
            .unwrap();
        let err = store.incr_by("s", 1).await.unwrap_err();
        assert!(err.is_transport());
        assert!(!store.is_connected());
        assert!(store.get("s").await.unwrap_err().is_disconnected());
    }

    #[tokio::test]
    async fn test_fail_injection_is_one_way() {
        let mut store = MemoryStore::new();
        store.fail_commands(true);
        assert!(store.get("k").await.unwrap_err().is_transport());
        assert!(!store.is_connected());

        // Clearing the fault does not reconnect.
        store.fail_commands(false);
        assert!(store.get("k").await.unwrap_err().is_disconnected());
    }

    #[tokio::test]
    async fn test_scan_keys_prefix_pattern() {
        let mut store = MemoryStore::new();
        for key in ["app:1:default:a", "app:1:posts:b", "app:2:default:c"] {
            store
                .set_with_ttl(key, &json!(1), Duration::ZERO)
                .await
                .unwrap();
        }
        let mut keys = store.scan_keys("app:1:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["app:1:default:a", "app:1:posts:b"]);
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("app:1:*", "app:1:default:k"));
        assert!(!glob_match("app:1:*", "app:10:default:k"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exact:more"));
        assert!(glob_match("a*c", "abc"));
        assert!(glob_match("a*c", "ac"));
        assert!(!glob_match("a*c", "ab"));
        assert!(glob_match("*suffix", "has suffix"));
        assert!(glob_match("a*b*c", "aXbYc"));
        assert!(!glob_match("a*b*c", "aXc"));
    }
}
