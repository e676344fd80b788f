//! The remote store trait implemented by all backends.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// A networked key-value store backing the shared cache tier.
///
/// Backends fail closed: any transport-level error flips the backend to
/// disconnected, the failing call returns an error, and every subsequent
/// call is a no-op returning [`StoreError::Disconnected`]. There is no
/// reconnect path within an instance's lifetime.
///
/// # Example
///
/// ```ignore
/// use tiercache_store::{RemoteStore, StoreError};
///
/// async fn read_through(store: &mut dyn RemoteStore, key: &str) -> Result<bool, StoreError> {
///     Ok(store.get(key).await?.is_some())
/// }
/// ```
#[async_trait]
pub trait RemoteStore: Send {
    /// Reads a value by key.
    ///
    /// Returns `None` if the key does not exist, or if the stored value
    /// cannot be decoded (e.g. written raw by a foreign client) — neither
    /// is a failure. An error is returned only for transport-level
    /// failures.
    async fn get(&mut self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Writes a value with the given time-to-live.
    ///
    /// TTL granularity is whole seconds; backends round sub-second TTLs up
    /// rather than reject them. A zero TTL stores without expiry.
    async fn set_with_ttl(
        &mut self,
        key: &str,
        value: &Value,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Deletes a key. Deleting a missing key is not an error.
    async fn delete(&mut self, key: &str) -> Result<(), StoreError>;

    /// Returns whether the key exists.
    async fn exists(&mut self, key: &str) -> Result<bool, StoreError>;

    /// Atomically increments the integer value at `key` by `delta`.
    ///
    /// A missing key starts from 0. A non-integer stored value is a command
    /// error (and therefore trips the disconnect).
    async fn incr_by(&mut self, key: &str, delta: i64) -> Result<(), StoreError>;

    /// Atomically decrements the integer value at `key` by `delta`.
    async fn decr_by(&mut self, key: &str, delta: i64) -> Result<(), StoreError>;

    /// Enumerates keys matching a glob pattern (e.g. `prefix:1:*`).
    async fn scan_keys(&mut self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Closes the connection, swallowing any error from the close itself.
    async fn close(&mut self);

    /// Returns whether the backend is still connected.
    ///
    /// This is the observable side of the one-way connected → disconnected
    /// transition; it never flips back to `true`.
    fn is_connected(&self) -> bool;

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Type alias for a boxed remote store instance.
pub type DynRemoteStore = Box<dyn RemoteStore>;
