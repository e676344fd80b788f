//! Remote store abstraction for the tiercache object cache.
//!
//! This crate defines the seam between the cache engine and the shared,
//! networked key-value store backing it. Concrete backends live in their
//! own crates (`tiercache-store-redis`, `tiercache-store-memory`).

pub mod error;
pub mod traits;

pub use error::StoreError;
pub use traits::{DynRemoteStore, RemoteStore};
