//! Repair of metadata/blob divergence
//!
//! Lookups call [`verify_entry`]: an entry whose blob has disappeared is
//! dropped from the index and reported as a miss. [`sweep`] does the same
//! for every entry and also deletes blobs no entry references; it only runs
//! when explicitly requested.

use crate::cache::blob::BlobStore;
use crate::cache::key::CacheKey;
use crate::cache::metadata::MetadataIndex;
use crate::error::SkyshotResult;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Result of checking one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verified {
    /// Blob exists at this path
    Present(PathBuf),
    /// Entry was purged because its blob is gone
    Purged,
    /// No entry for the key
    Absent,
}

/// Outcome of a full sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Entries removed because their blob was missing
    pub purged_entries: Vec<CacheKey>,
    /// Blob files deleted because no entry referenced them
    pub removed_orphans: Vec<String>,
}

impl ReconcileReport {
    /// Whether the index changed
    pub fn index_changed(&self) -> bool {
        !self.purged_entries.is_empty()
    }
}

/// Check that `key`'s blob exists, purging the entry if it does not
///
/// The caller persists the index when this returns `Purged`.
pub async fn verify_entry(
    index: &mut MetadataIndex,
    blobs: &dyn BlobStore,
    key: &CacheKey,
) -> Verified {
    let Some(entry) = index.get(key) else {
        return Verified::Absent;
    };

    if let Some(path) = blobs.blob_path(&entry.blob_name).await {
        return Verified::Present(path);
    }

    warn!(
        "Blob {} missing for cached {}, purging entry",
        entry.blob_name, entry.location_key
    );
    index.remove(key);
    Verified::Purged
}

/// Verify every entry and delete unreferenced blobs
pub async fn sweep(
    index: &mut MetadataIndex,
    blobs: &dyn BlobStore,
    extension: &str,
) -> SkyshotResult<ReconcileReport> {
    let mut report = ReconcileReport::default();

    let keys: Vec<CacheKey> = index.keys().cloned().collect();
    for key in keys {
        if verify_entry(index, blobs, &key).await == Verified::Purged {
            report.purged_entries.push(key);
        }
    }

    let referenced: HashSet<&str> = index.iter().map(|e| e.blob_name.as_str()).collect();
    for name in blobs.list_blobs(extension).await? {
        if referenced.contains(name.as_str()) {
            continue;
        }
        match blobs.delete_blob(&name).await {
            Ok(()) => {
                debug!("Removed orphaned blob {}", name);
                report.removed_orphans.push(name);
            }
            Err(e) => warn!("Failed to remove orphaned blob {}: {}", name, e),
        }
    }

    Ok(report)
}
