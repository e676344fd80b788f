//! The cache engine: tiering policy, key namespacing, write-through, and
//! degraded-mode behavior when the remote store is down.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde_json::Value;
use tiercache_store::DynRemoteStore;
use tiercache_store_redis::RedisStore;

use crate::config::CacheConfig;
use crate::key;
use crate::local::{LocalEntry, LocalTier};
use crate::stats::CacheStats;

/// Group used when callers pass an empty group name.
pub const DEFAULT_GROUP: &str = "default";

/// A two-tier object cache: an in-process local tier fronting a shared
/// remote store.
///
/// ## Tiering
///
/// Reads consult the local tier first (unless forced), then read through
/// to the remote store and cache the outcome, including a known-absent
/// marker for confirmed misses. Writes go through to the remote store and
/// always land in the local tier.
///
/// ## Degraded mode
///
/// Any transport failure permanently disconnects the remote store for this
/// instance; every operation then falls back to local-only behavior. The
/// transition is observable via [`ObjectCache::is_connected`].
///
/// ## Ownership
///
/// One owner per instance; operations take `&mut self` and run to
/// completion. The local tier is never shared across instances, so
/// cross-instance consistency relies entirely on the remote store.
pub struct ObjectCache {
    prefix: String,
    max_ttl: Duration,
    tenant_id: u64,
    store: Option<DynRemoteStore>,
    local: LocalTier,
    no_remote_groups: HashSet<String>,
    global_groups: HashSet<String>,
    stats: CacheStats,
}

impl ObjectCache {
    /// Creates a local-only cache with no remote store.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self::build(config, None)
    }

    /// Creates a cache backed by the given remote store.
    #[must_use]
    pub fn with_store(config: &CacheConfig, store: DynRemoteStore) -> Self {
        Self::build(config, Some(store))
    }

    /// Creates a cache backed by Redis per the config.
    ///
    /// Never fails: if the connection cannot be established, the cache
    /// starts local-only, exactly as if the store had disconnected later.
    pub async fn connect(config: &CacheConfig) -> Self {
        match RedisStore::connect(&config.host, config.port, config.connect_timeout()).await {
            Ok(store) => Self::with_store(config, Box::new(store)),
            Err(e) => {
                tracing::warn!(
                    host = %config.host,
                    port = %config.port,
                    error = %e,
                    "remote store unavailable, starting local-only"
                );
                Self::new(config)
            }
        }
    }

    fn build(config: &CacheConfig, store: Option<DynRemoteStore>) -> Self {
        if let Some(store) = &store {
            tracing::debug!(
                backend = %store.backend_name(),
                tenant_id = %config.tenant_id,
                "remote store attached"
            );
        }
        Self {
            prefix: config.key_prefix(),
            max_ttl: config.max_ttl(),
            tenant_id: config.tenant_id,
            store,
            local: LocalTier::new(),
            no_remote_groups: HashSet::new(),
            global_groups: HashSet::new(),
            stats: CacheStats::default(),
        }
    }

    /// Reads a value.
    ///
    /// With `force`, the local tier is bypassed and the remote store is
    /// consulted directly (when the group is remote-backed). Returned
    /// values are owned copies; mutating them never touches the cache.
    pub async fn get(&mut self, key: &str, group: &str, force: bool) -> Option<Value> {
        let group = resolve_group(group);
        let partition = self.partition(group);

        if !force {
            if let Some(entry) = self.local.get(partition, group, key) {
                self.stats.record_hit();
                return match entry {
                    LocalEntry::Hit(value) => Some(value.clone()),
                    LocalEntry::KnownAbsent => None,
                };
            }
        }

        if !self.no_remote_groups.contains(group) {
            let remote_key = self.remote_key(partition, group, key);
            if let Some(store) = self.store.as_mut().filter(|s| s.is_connected()) {
                let started = Instant::now();
                match store.get(&remote_key).await {
                    Ok(Some(value)) => {
                        self.stats.record_get(group, started.elapsed());
                        self.stats.record_hit();
                        self.local
                            .insert(partition, group, key, LocalEntry::Hit(value.clone()));
                        tracing::debug!(key = %key, group = %group, "cache hit (remote)");
                        return Some(value);
                    }
                    Ok(None) => {
                        self.stats.record_get(group, started.elapsed());
                        // Remember the confirmed miss so unforced reads stop
                        // hitting the remote store for this key.
                        self.local
                            .insert(partition, group, key, LocalEntry::KnownAbsent);
                    }
                    Err(e) => {
                        tracing::warn!(key = %key, group = %group, error = %e, "remote get failed");
                        return None;
                    }
                }
            }
        }

        self.stats.record_miss();
        None
    }

    /// Writes a value, write-through to the remote store when the group is
    /// remote-backed.
    ///
    /// Never fails from the caller's perspective: a remote failure
    /// disconnects the store but the local write still applies.
    pub async fn set(&mut self, key: &str, value: Value, group: &str, ttl: Duration) -> bool {
        let group = resolve_group(group);
        let ttl = self.resolve_ttl(ttl);
        let partition = self.partition(group);

        if !self.no_remote_groups.contains(group) {
            let remote_key = self.remote_key(partition, group, key);
            if let Some(store) = self.store.as_mut().filter(|s| s.is_connected()) {
                let started = Instant::now();
                match store.set_with_ttl(&remote_key, &value, ttl).await {
                    Ok(()) => self.stats.record_set(group, started.elapsed()),
                    Err(e) => {
                        tracing::warn!(
                            key = %key,
                            group = %group,
                            error = %e,
                            "remote set failed, keeping local copy"
                        );
                    }
                }
            }
        }

        self.local.insert(partition, group, key, LocalEntry::Hit(value));
        true
    }

    /// Stores a value only if the key is currently absent.
    ///
    /// Returns `false` without mutating anything when the key exists or
    /// when the existence check itself fails.
    pub async fn add(&mut self, key: &str, value: Value, group: &str, ttl: Duration) -> bool {
        let group_name = resolve_group(group);
        match self.key_exists(key, group_name).await {
            Some(false) => self.set(key, value, group_name, ttl).await,
            Some(true) | None => false,
        }
    }

    /// Overwrites a value only if the key currently exists.
    ///
    /// Returns `false` without mutating anything when the key is absent or
    /// when the existence check itself fails.
    pub async fn replace(&mut self, key: &str, value: Value, group: &str, ttl: Duration) -> bool {
        let group_name = resolve_group(group);
        match self.key_exists(key, group_name).await {
            Some(true) => self.set(key, value, group_name, ttl).await,
            Some(false) | None => false,
        }
    }

    /// Deletes a key from both tiers.
    ///
    /// Returns `true` even when the key was absent; `false` only when the
    /// remote delete hit a transport failure.
    pub async fn delete(&mut self, key: &str, group: &str) -> bool {
        let group = resolve_group(group);
        let partition = self.partition(group);
        self.local.remove(partition, group, key);

        if !self.no_remote_groups.contains(group) {
            let remote_key = self.remote_key(partition, group, key);
            if let Some(store) = self.store.as_mut().filter(|s| s.is_connected()) {
                if let Err(e) = store.delete(&remote_key).await {
                    tracing::warn!(key = %key, group = %group, error = %e, "remote delete failed");
                    return false;
                }
            }
        }
        true
    }

    /// Atomically increments a counter by `delta`.
    ///
    /// The new count is not returned; callers observe it via [`Self::get`].
    pub async fn incr(&mut self, key: &str, delta: i64, group: &str) -> bool {
        self.apply_offset(key, delta, group, false).await
    }

    /// Atomically decrements a counter by `delta`.
    pub async fn decr(&mut self, key: &str, delta: i64, group: &str) -> bool {
        self.apply_offset(key, delta, group, true).await
    }

    async fn apply_offset(&mut self, key: &str, delta: i64, group: &str, negate: bool) -> bool {
        let group = resolve_group(group);
        let partition = self.partition(group);
        let signed = if negate { -delta } else { delta };

        let remote_backed =
            !self.no_remote_groups.contains(group) && self.is_connected();
        if remote_backed {
            let remote_key = self.remote_key(partition, group, key);
            if let Some(store) = self.store.as_mut() {
                let result = if negate {
                    store.decr_by(&remote_key, delta).await
                } else {
                    store.incr_by(&remote_key, delta).await
                };
                if let Err(e) = result {
                    tracing::warn!(key = %key, group = %group, error = %e, "remote counter update failed");
                    return false;
                }
            }
            if self.local.contains(partition, group, key) {
                self.bump_local(partition, group, key, signed);
            } else {
                // Seed the local tier from the freshly updated remote value.
                self.get(key, group, false).await;
            }
        } else {
            if !self.local.contains(partition, group, key) {
                self.local
                    .insert(partition, group, key, LocalEntry::Hit(Value::from(0)));
            }
            self.bump_local(partition, group, key, signed);
        }
        true
    }

    /// Applies a signed delta to an existing local entry. Non-numeric
    /// values and known-absent markers count from 0.
    fn bump_local(&mut self, partition: u64, group: &str, key: &str, delta: i64) {
        if let Some(entry) = self.local.get_mut(partition, group, key) {
            let current = match entry {
                LocalEntry::Hit(value) => value.as_i64().unwrap_or(0),
                LocalEntry::KnownAbsent => 0,
            };
            *entry = LocalEntry::Hit(Value::from(current + delta));
        }
    }

    /// Clears the entire local tier (all tenants, all groups) and, when
    /// connected, deletes every remote key under the current tenant's
    /// partition and the global partition.
    pub async fn flush(&mut self) -> bool {
        self.local.clear();

        let patterns = [
            key::partition_pattern(&self.prefix, self.tenant_id),
            key::partition_pattern(&self.prefix, key::GLOBAL_PARTITION),
        ];
        if let Some(store) = self.store.as_mut().filter(|s| s.is_connected()) {
            for pattern in patterns {
                let keys = match store.scan_keys(&pattern).await {
                    Ok(keys) => keys,
                    Err(e) => {
                        tracing::warn!(pattern = %pattern, error = %e, "remote flush scan failed");
                        return false;
                    }
                };
                for remote_key in keys {
                    if let Err(e) = store.delete(&remote_key).await {
                        tracing::warn!(key = %remote_key, error = %e, "remote flush delete failed");
                        return false;
                    }
                }
            }
            tracing::debug!("flushed local and remote tiers");
        }
        true
    }

    /// Switches the active tenant used for future partition derivation.
    ///
    /// Entries cached under the previous tenant's partition are orphaned,
    /// not purged.
    pub fn switch_tenant(&mut self, tenant_id: u64) {
        self.tenant_id = tenant_id;
    }

    /// Marks groups as local-only: they never touch the remote store.
    /// Additive and idempotent; there is no removal.
    pub fn add_non_persistent_groups<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.no_remote_groups
            .extend(groups.into_iter().map(Into::into));
    }

    /// Marks groups as global: shared across tenants via partition 0.
    /// Additive and idempotent; there is no removal.
    pub fn add_global_groups<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global_groups
            .extend(groups.into_iter().map(Into::into));
    }

    /// Closes the remote connection if still connected. Errors from the
    /// close itself are swallowed.
    pub async fn close(&mut self) {
        if let Some(store) = self.store.as_mut() {
            if store.is_connected() {
                store.close().await;
                tracing::debug!(backend = %store.backend_name(), "remote store closed");
            }
        }
    }

    /// Whether the remote store is still connected. One-way: once `false`,
    /// it stays `false` for the lifetime of this instance.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.store.as_ref().is_some_and(|s| s.is_connected())
    }

    /// The active tenant id.
    #[must_use]
    pub fn tenant_id(&self) -> u64 {
        self.tenant_id
    }

    /// Groups that never touch the remote store.
    #[must_use]
    pub fn no_remote_groups(&self) -> &HashSet<String> {
        &self.no_remote_groups
    }

    /// Groups shared across tenants.
    #[must_use]
    pub fn global_groups(&self) -> &HashSet<String> {
        &self.global_groups
    }

    /// Accumulated hit/miss and timing counters.
    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Renders a human-readable stats summary.
    #[must_use]
    pub fn render_stats(&self) -> String {
        self.stats.render(self.is_connected())
    }

    /// Existence check backing `add`/`replace`: remote `EXISTS` when
    /// remote-backed and connected, local-tier presence otherwise.
    /// `None` means the remote check hit a transport failure.
    async fn key_exists(&mut self, key: &str, group: &str) -> Option<bool> {
        if !self.no_remote_groups.contains(group) {
            let partition = self.partition(group);
            let remote_key = self.remote_key(partition, group, key);
            if let Some(store) = self.store.as_mut().filter(|s| s.is_connected()) {
                return match store.exists(&remote_key).await {
                    Ok(exists) => Some(exists),
                    Err(e) => {
                        tracing::warn!(key = %key, group = %group, error = %e, "remote exists failed");
                        None
                    }
                };
            }
        }
        let partition = self.partition(group);
        Some(self.local.contains(partition, group, key))
    }

    fn partition(&self, group: &str) -> u64 {
        key::partition(self.tenant_id, group, &self.global_groups)
    }

    fn remote_key(&self, partition: u64, group: &str, key_name: &str) -> String {
        key::remote_key(&self.prefix, partition, group, key_name)
    }

    fn resolve_ttl(&self, ttl: Duration) -> Duration {
        if ttl.is_zero() { self.max_ttl } else { ttl }
    }
}

fn resolve_group(group: &str) -> &str {
    if group.is_empty() { DEFAULT_GROUP } else { group }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_group_defaults_when_empty() {
        assert_eq!(resolve_group(""), DEFAULT_GROUP);
        assert_eq!(resolve_group("posts"), "posts");
    }

    #[test]
    fn test_resolve_ttl_defaults_when_zero() {
        let cache = ObjectCache::new(&CacheConfig::default());
        assert_eq!(cache.resolve_ttl(Duration::ZERO), cache.max_ttl);
        assert_eq!(
            cache.resolve_ttl(Duration::from_secs(30)),
            Duration::from_secs(30)
        );
    }
}
