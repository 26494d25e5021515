//! Capacity-bounded eviction
//!
//! After each insertion that pushes the index past capacity, exactly one
//! victim is removed: the entry at the front of the index order. Under
//! `Fifo` reads never reorder the index, so the victim is the oldest
//! insertion. Under `Lru` every hit moves its entry to the back.

use crate::cache::blob::BlobStore;
use crate::cache::entry::CacheEntry;
use crate::cache::key::CacheKey;
use crate::cache::metadata::MetadataIndex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Victim ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Evict by insertion order
    #[default]
    Fifo,
    /// Evict by least recent hit
    Lru,
}

impl EvictionPolicy {
    /// Record a cache hit. Returns true if the index order changed.
    pub fn on_hit(&self, index: &mut MetadataIndex, key: &CacheKey) -> bool {
        match self {
            Self::Fifo => false,
            Self::Lru => index.touch(key),
        }
    }

    /// Next victim, if the index is over capacity
    pub fn select_victim<'a>(
        &self,
        index: &'a MetadataIndex,
        capacity: usize,
    ) -> Option<&'a CacheKey> {
        if index.len() > capacity {
            index.front()
        } else {
            None
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fifo => write!(f, "fifo"),
            Self::Lru => write!(f, "lru"),
        }
    }
}

/// Evict at most one entry if the index exceeds `capacity`
///
/// Blob deletion is best-effort: a failure is logged and the metadata
/// record is removed anyway, leaving an unreferenced file behind.
/// The caller is responsible for persisting the index.
pub async fn evict_overflow(
    policy: EvictionPolicy,
    index: &mut MetadataIndex,
    blobs: &dyn BlobStore,
    capacity: usize,
) -> Option<CacheEntry> {
    let victim = policy.select_victim(index, capacity)?.clone();
    let entry = index.remove(&victim)?;

    if let Err(e) = blobs.delete_blob(&entry.blob_name).await {
        warn!("Failed to remove evicted blob {}: {}", entry.blob_name, e);
    }

    info!(
        "Evicted cache entry for {} ({}), {} entries remain",
        entry.location_key,
        entry.request_date.format("%Y-%m-%d"),
        index.len()
    );
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::blob::FsBlobStore;
    use crate::cache::key::derive_key;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tempfile::TempDir;

    fn entry(location: &str) -> CacheEntry {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let key = derive_key(location, &date);
        CacheEntry {
            blob_name: key.blob_name("png"),
            key,
            location_key: location.to_string(),
            request_date: date,
            location_info: json!(null),
            created_at: Utc::now(),
            prompt: None,
        }
    }

    #[test]
    fn policy_display_and_default() {
        assert_eq!(EvictionPolicy::default(), EvictionPolicy::Fifo);
        assert_eq!(EvictionPolicy::Fifo.to_string(), "fifo");
        assert_eq!(EvictionPolicy::Lru.to_string(), "lru");
    }

    #[test]
    fn fifo_ignores_hits() {
        let mut index = MetadataIndex::new();
        index.insert(entry("a"));
        index.insert(entry("b"));

        assert!(!EvictionPolicy::Fifo.on_hit(&mut index, &entry("a").key));
        assert_eq!(
            EvictionPolicy::Fifo.select_victim(&index, 1),
            Some(&entry("a").key)
        );
    }

    #[test]
    fn lru_hit_protects_entry() {
        let mut index = MetadataIndex::new();
        index.insert(entry("a"));
        index.insert(entry("b"));

        assert!(EvictionPolicy::Lru.on_hit(&mut index, &entry("a").key));
        assert_eq!(
            EvictionPolicy::Lru.select_victim(&index, 1),
            Some(&entry("b").key)
        );
    }

    #[test]
    fn no_victim_within_capacity() {
        let mut index = MetadataIndex::new();
        index.insert(entry("a"));
        assert_eq!(EvictionPolicy::Fifo.select_victim(&index, 1), None);
    }

    #[tokio::test]
    async fn evicts_exactly_one() {
        let temp = TempDir::new().unwrap();
        let blobs = FsBlobStore::new(temp.path());
        let mut index = MetadataIndex::new();
        for loc in ["a", "b", "c", "d"] {
            let e = entry(loc);
            blobs.write_blob(&e.blob_name, b"img").await.unwrap();
            index.insert(e);
        }

        let victim = evict_overflow(EvictionPolicy::Fifo, &mut index, &blobs, 2)
            .await
            .unwrap();

        assert_eq!(victim.location_key, "a");
        assert_eq!(index.len(), 3);
        assert!(blobs.blob_path(&victim.blob_name).await.is_none());
    }
}
