//! Diagnostic counters
//!
//! Conditions that are deliberately not errors (cache outages, missing keys,
//! unresolved placeholders) are only visible here.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct Diagnostics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_degraded: AtomicU64,
    cache_write_failures: AtomicU64,
    missing_keys: AtomicU64,
    unresolved_placeholders: AtomicU64,
    fallback_resolutions: AtomicU64,
    reloads_succeeded: AtomicU64,
    reloads_failed: AtomicU64,
    dropped_entries: AtomicU64,
}

/// Point-in-time copy of [`Diagnostics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_degraded: u64,
    pub cache_write_failures: u64,
    pub missing_keys: u64,
    pub unresolved_placeholders: u64,
    pub fallback_resolutions: u64,
    pub reloads_succeeded: u64,
    pub reloads_failed: u64,
    pub dropped_entries: u64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hit(&self) {
        bump(&self.cache_hits, 1);
    }

    pub fn cache_miss(&self) {
        bump(&self.cache_misses, 1);
    }

    /// A cache read failed or timed out and was treated as a miss
    pub fn cache_degraded(&self) {
        bump(&self.cache_degraded, 1);
    }

    pub fn cache_write_failed(&self) {
        bump(&self.cache_write_failures, 1);
    }

    pub fn missing_key(&self) {
        bump(&self.missing_keys, 1);
    }

    pub fn unresolved_placeholders(&self, count: usize) {
        bump(&self.unresolved_placeholders, count as u64);
    }

    pub fn fallback_resolution(&self) {
        bump(&self.fallback_resolutions, 1);
    }

    pub fn reload_succeeded(&self, dropped_entries: usize) {
        bump(&self.reloads_succeeded, 1);
        bump(&self.dropped_entries, dropped_entries as u64);
    }

    pub fn reload_failed(&self) {
        bump(&self.reloads_failed, 1);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        DiagnosticsSnapshot {
            cache_hits: load(&self.cache_hits),
            cache_misses: load(&self.cache_misses),
            cache_degraded: load(&self.cache_degraded),
            cache_write_failures: load(&self.cache_write_failures),
            missing_keys: load(&self.missing_keys),
            unresolved_placeholders: load(&self.unresolved_placeholders),
            fallback_resolutions: load(&self.fallback_resolutions),
            reloads_succeeded: load(&self.reloads_succeeded),
            reloads_failed: load(&self.reloads_failed),
            dropped_entries: load(&self.dropped_entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let diagnostics = Diagnostics::new();
        diagnostics.cache_degraded();
        diagnostics.cache_degraded();
        diagnostics.unresolved_placeholders(3);
        diagnostics.reload_succeeded(4);

        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot.cache_degraded, 2);
        assert_eq!(snapshot.unresolved_placeholders, 3);
        assert_eq!(snapshot.reloads_succeeded, 1);
        assert_eq!(snapshot.dropped_entries, 4);
        assert_eq!(snapshot.cache_hits, 0);
    }
}
