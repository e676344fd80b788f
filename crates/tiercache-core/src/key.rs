//! Key derivation for the remote tier and local partitions.
//!
//! Remote keys are `prefix:partition:group:key`. The mapping is injective
//! over (partition, group, key) as long as group names contain no `:`,
//! which the engine relies on for tenant isolation in the shared store.

use std::collections::HashSet;

/// Partition id shared by all tenants for global groups.
pub const GLOBAL_PARTITION: u64 = 0;

/// Returns the partition a group maps to: [`GLOBAL_PARTITION`] for global
/// groups, otherwise the active tenant id.
#[must_use]
pub fn partition(tenant_id: u64, group: &str, global_groups: &HashSet<String>) -> u64 {
    if global_groups.contains(group) {
        GLOBAL_PARTITION
    } else {
        tenant_id
    }
}

/// Builds the fully-qualified remote store key.
#[must_use]
pub fn remote_key(prefix: &str, partition: u64, group: &str, key: &str) -> String {
    format!("{prefix}:{partition}:{group}:{key}")
}

/// Builds the scan pattern covering every key in a partition.
#[must_use]
pub fn partition_pattern(prefix: &str, partition: u64) -> String {
    format!("{prefix}:{partition}:*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_routing() {
        let mut global = HashSet::new();
        global.insert("site-options".to_string());

        assert_eq!(partition(3, "site-options", &global), GLOBAL_PARTITION);
        assert_eq!(partition(3, "posts", &global), 3);
        assert_eq!(partition(3, "posts", &HashSet::new()), 3);
    }

    #[test]
    fn test_remote_key_format() {
        assert_eq!(
            remote_key("app:main:obj", 2, "posts", "42"),
            "app:main:obj:2:posts:42"
        );
    }

    #[test]
    fn test_partition_pattern_covers_remote_keys() {
        let key = remote_key("app:main:obj", 2, "posts", "42");
        let pattern = partition_pattern("app:main:obj", 2);
        assert_eq!(pattern, "app:main:obj:2:*");
        assert!(key.starts_with(pattern.trim_end_matches('*')));
    }
}
