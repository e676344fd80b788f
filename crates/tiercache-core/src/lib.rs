//! Two-tier object cache: a process-local tier fronting a shared remote
//! key-value store.
//!
//! ## Architecture
//!
//! - **Local tier**: in-memory, per-instance, unbounded; cleared only by
//!   `flush`. Holds cached values and known-absent markers.
//! - **Remote tier**: a networked key-value store (Redis by default),
//!   shared across processes, owning TTL expiry.
//!
//! ```text
//! get(key) → local tier → remote store
//!                ↓             ↓
//!           cached value  read-through + promote
//! ```
//!
//! ## Graceful degradation
//!
//! Any transport failure disconnects the remote store for the rest of the
//! instance's lifetime; the cache silently falls back to local-only
//! behavior. No operation ever surfaces a hard fault to the caller.
//!
//! ## Multi-tenancy
//!
//! Keys are namespaced by (partition, group, key). Non-global groups
//! partition by the active tenant id; groups registered as global share
//! partition 0 across tenants. Groups registered as non-persistent never
//! touch the remote store.

pub mod config;
pub mod engine;
pub mod key;
pub mod local;
pub mod stats;

pub use config::CacheConfig;
pub use engine::{DEFAULT_GROUP, ObjectCache};
pub use local::{LocalEntry, LocalTier};
pub use stats::{CacheStats, GroupStats};

// Re-export the store seam so hosts can inject their own backend without
// depending on the trait crate directly.
pub use tiercache_store::{DynRemoteStore, RemoteStore, StoreError};
