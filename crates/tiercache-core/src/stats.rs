//! Hit/miss counters and per-group remote timing.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;

/// Per-group remote request accounting.
#[derive(Debug, Default, Clone)]
pub struct GroupStats {
    /// Remote set count.
    pub sets: u64,
    /// Cumulative remote set time.
    pub set_time: Duration,
    /// Remote get count.
    pub gets: u64,
    /// Cumulative remote get time.
    pub get_time: Duration,
}

/// Monotonically increasing cache counters.
///
/// Hits and misses count local-tier outcomes and remote read-throughs;
/// timings cover remote round-trips only (local hits are effectively free).
/// Counters reset only when the engine is recreated.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Total cache hits (local tier or remote read-through).
    pub hits: u64,
    /// Total cache misses.
    pub misses: u64,
    requests: HashMap<String, GroupStats>,
}

impl CacheStats {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_get(&mut self, group: &str, elapsed: Duration) {
        let entry = self.requests.entry(group.to_string()).or_default();
        entry.gets += 1;
        entry.get_time += elapsed;
    }

    pub fn record_set(&mut self, group: &str, elapsed: Duration) {
        let entry = self.requests.entry(group.to_string()).or_default();
        entry.sets += 1;
        entry.set_time += elapsed;
    }

    /// Returns the accumulated stats for a group, if any remote request
    /// has been recorded for it.
    #[must_use]
    pub fn group(&self, group: &str) -> Option<&GroupStats> {
        self.requests.get(group)
    }

    /// Total remote time across all groups.
    #[must_use]
    pub fn total_time(&self) -> Duration {
        self.requests
            .values()
            .map(|g| g.set_time + g.get_time)
            .sum()
    }

    /// Renders a human-readable summary.
    #[must_use]
    pub fn render(&self, connected: bool) -> String {
        let status = if connected { "connected" } else { "disconnected" };
        let mut out = String::new();
        let _ = writeln!(out, "status: {status}");
        let _ = writeln!(out, "hits: {}", self.hits);
        let _ = writeln!(out, "misses: {}", self.misses);
        let _ = writeln!(out, "total time: {}", format_ms(self.total_time()));

        if self.requests.is_empty() {
            return out;
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<24} {:>8} {:>8} {:>12} {:>12}",
            "group", "sets", "gets", "set time", "get time"
        );
        let mut groups: Vec<_> = self.requests.iter().collect();
        groups.sort_by(|a, b| a.0.cmp(b.0));
        for (group, stats) in groups {
            let _ = writeln!(
                out,
                "{:<24} {:>8} {:>8} {:>12} {:>12}",
                group,
                stats.sets,
                stats.gets,
                format_ms(stats.set_time),
                format_ms(stats.get_time)
            );
        }
        out
    }
}

fn format_ms(elapsed: Duration) -> String {
    format!("{:.2} ms", elapsed.as_secs_f64() * 1_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let mut stats = CacheStats::default();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_get("default", Duration::from_millis(2));
        stats.record_get("default", Duration::from_millis(3));
        stats.record_set("posts", Duration::from_millis(5));

        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.group("default").unwrap().gets, 2);
        assert_eq!(
            stats.group("default").unwrap().get_time,
            Duration::from_millis(5)
        );
        assert_eq!(stats.group("posts").unwrap().sets, 1);
        assert_eq!(stats.total_time(), Duration::from_millis(10));
    }

    #[test]
    fn test_render_reports_everything() {
        let mut stats = CacheStats::default();
        stats.record_hit();
        stats.record_miss();
        stats.record_set("posts", Duration::from_millis(1));
        stats.record_get("default", Duration::from_millis(2));

        let report = stats.render(true);
        assert!(report.contains("status: connected"));
        assert!(report.contains("hits: 1"));
        assert!(report.contains("misses: 1"));
        assert!(report.contains("posts"));
        assert!(report.contains("default"));

        let report = stats.render(false);
        assert!(report.contains("status: disconnected"));
    }
}
