// # Snapshot Cache
//
// In-memory record of the last successfully normalized address set per
// source.
//
// ## Purpose
//
// When a fetch fails (transport error, non-success status, malformed body)
// the previous good data is republished instead of an empty rule.
//
// ## Lifetime
//
// - Entries are created lazily on the first successful fetch of a source
// - Entries are overwritten only on success, never removed
// - Everything is dropped with the owning worker
//
// ## Concurrency
//
// The cache is owned by exactly one polling worker and is never shared, so
// it carries no locks.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::normalize::NormalizedAddressSet;

/// Last good data for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSnapshot {
    /// The normalized addresses
    pub addresses: NormalizedAddressSet,
    /// When the addresses were fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedSnapshot {
    fn new(addresses: NormalizedAddressSet) -> Self {
        Self {
            addresses,
            fetched_at: Utc::now(),
        }
    }

    /// Time elapsed since the snapshot was fetched
    pub fn age(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.fetched_at)
    }
}

/// Per-source snapshot cache
///
/// # Example
///
/// ```rust
/// use dynwl_core::normalize::split_list;
/// use dynwl_core::state::SnapshotCache;
///
/// let mut cache = SnapshotCache::new();
/// assert!(cache.get("office").is_none());
///
/// cache.put("office", split_list("10.0.0.3\n10.0.0.4\n"));
/// assert_eq!(cache.get("office").unwrap().addresses.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct SnapshotCache {
    entries: HashMap<String, CachedSnapshot>,
}

impl SnapshotCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Last good snapshot for `key`, if any fetch of it ever succeeded
    pub fn get(&self, key: &str) -> Option<&CachedSnapshot> {
        self.entries.get(key)
    }

    /// Record a successful fetch for `key`
    pub fn put(&mut self, key: impl Into<String>, addresses: NormalizedAddressSet) {
        self.entries.insert(key.into(), CachedSnapshot::new(addresses));
    }

    /// Number of sources with a snapshot
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
