//! Cache engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a cache engine instance.
///
/// Hosts typically deserialize this from their own config file; every field
/// has a usable default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Remote store host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Remote store port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connect timeout (ms).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Data-namespace identifier (e.g. the database name); first component
    /// of the remote key prefix.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Scope prefix within the namespace; second component of the remote
    /// key prefix.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Active tenant id. Partition 0 is reserved for global groups.
    #[serde(default = "default_tenant_id")]
    pub tenant_id: u64,

    /// Maximum (and default) entry TTL in seconds.
    #[serde(default = "default_max_ttl")]
    pub max_ttl_secs: u64,
}

impl CacheConfig {
    /// The remote key prefix shared by every key this instance writes.
    #[must_use]
    pub fn key_prefix(&self) -> String {
        format!("{}:{}:obj", self.namespace, self.scope)
    }

    /// Connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Maximum TTL as a `Duration`.
    #[must_use]
    pub fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout(),
            namespace: default_namespace(),
            scope: default_scope(),
            tenant_id: default_tenant_id(),
            max_ttl_secs: default_max_ttl(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_connect_timeout() -> u64 {
    2_000
}

fn default_namespace() -> String {
    "app".to_string()
}

fn default_scope() -> String {
    "main".to_string()
}

fn default_tenant_id() -> u64 {
    1
}

fn default_max_ttl() -> u64 {
    86_400
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 6379);
        assert_eq!(config.tenant_id, 1);
        assert_eq!(config.max_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.connect_timeout(), Duration::from_millis(2_000));
    }

    #[test]
    fn test_key_prefix() {
        let config = CacheConfig {
            namespace: "shop".to_string(),
            scope: "eu".to_string(),
            ..CacheConfig::default()
        };
        assert_eq!(config.key_prefix(), "shop:eu:obj");
    }

    #[test]
    fn test_partial_deserialization() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"host": "cache.internal", "tenant_id": 7}"#).unwrap();
        assert_eq!(config.host, "cache.internal");
        assert_eq!(config.tenant_id, 7);
        assert_eq!(config.port, 6379);
        assert_eq!(config.max_ttl_secs, 86_400);
    }
}
