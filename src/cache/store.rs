//! Image cache: the single owner of the metadata index
//!
//! Every operation that reads or mutates the index holds one async mutex for
//! its full duration, including the blob write and the metadata rewrite.
//! This orders same-key stores, keeps evictions at one per overflow, and
//! keeps the entry count at or below capacity after every `set`.
//!
//! Generation on a miss runs outside that mutex, behind a per-key in-flight
//! lock, so concurrent misses for one key share a single generator call
//! while misses for other keys proceed in parallel. A key's in-flight slot
//! is released when its last holder finishes or is cancelled.

use crate::cache::blob::{BlobStore, FsBlobStore};
use crate::cache::entry::CacheEntry;
use crate::cache::eviction::{self, EvictionPolicy};
use crate::cache::key::{derive_key, CacheKey};
use crate::cache::metadata::{MetadataIndex, MetadataStore};
use crate::cache::reconcile::{self, ReconcileReport, Verified};
use crate::config::CacheConfig;
use crate::error::{SkyshotError, SkyshotResult};
use crate::generate::ImageGenerator;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A cache hit
#[derive(Debug, Clone)]
pub struct CachedImage {
    /// Path of the stored blob
    pub path: PathBuf,
    /// Entry metadata
    pub entry: CacheEntry,
}

/// Durable, bounded cache of generated images
pub struct ImageCache {
    blobs: Arc<dyn BlobStore>,
    metadata: MetadataStore,
    index: Mutex<MetadataIndex>,
    inflight: InflightMap,
    capacity: usize,
    policy: EvictionPolicy,
    extension: String,
}

impl ImageCache {
    /// Open the cache in `config.dir`, creating the directory if needed
    pub async fn open(config: &CacheConfig) -> SkyshotResult<Self> {
        fs::create_dir_all(&config.dir).await.map_err(|e| {
            SkyshotError::io(format!("creating cache directory {}", config.dir.display()), e)
        })?;

        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&config.dir));
        Self::with_stores(config, blobs, MetadataStore::in_dir(&config.dir)).await
    }

    /// Build a cache over explicit stores
    ///
    /// `config` is expected to be validated already (capacity of at least 1).
    pub async fn with_stores(
        config: &CacheConfig,
        blobs: Arc<dyn BlobStore>,
        metadata: MetadataStore,
    ) -> SkyshotResult<Self> {
        let index = metadata.load().await;
        debug!(
            "Opened image cache at {} with {} entries (capacity {}, {})",
            metadata.path().display(),
            index.len(),
            config.capacity,
            config.eviction
        );

        Ok(Self {
            blobs,
            metadata,
            index: Mutex::new(index),
            inflight: InflightMap::default(),
            capacity: config.capacity,
            policy: config.eviction,
            extension: config.extension.clone(),
        })
    }

    /// Look up the image for a location and date
    ///
    /// An entry whose blob has vanished is purged and reported as a miss.
    pub async fn get(
        &self,
        location: &str,
        date: DateTime<Utc>,
    ) -> SkyshotResult<Option<CachedImage>> {
        self.get_by_key(&derive_key(location, &date)).await
    }

    /// Look up by a precomputed key
    pub async fn get_by_key(&self, key: &CacheKey) -> SkyshotResult<Option<CachedImage>> {
        let mut index = self.index.lock().await;

        match reconcile::verify_entry(&mut index, self.blobs.as_ref(), key).await {
            Verified::Present(path) => {
                if self.policy.on_hit(&mut index, key) {
                    // The blob is there; only the new order failed to save
                    if let Err(e) = self.metadata.persist(&index).await {
                        warn!("Failed to persist cache order after hit: {}", e);
                    }
                }
                let Some(entry) = index.get(key).cloned() else {
                    return Ok(None);
                };
                debug!("Cache hit for {}", entry.location_key);
                Ok(Some(CachedImage { path, entry }))
            }
            Verified::Purged => {
                self.metadata.persist(&index).await?;
                Ok(None)
            }
            Verified::Absent => {
                debug!("Cache miss for {}", key);
                Ok(None)
            }
        }
    }

    /// Store an image, returning its path
    ///
    /// The blob is written before the entry is registered; a failed write
    /// leaves the index untouched. A second store for the same key replaces
    /// the entry.
    pub async fn set(
        &self,
        location: &str,
        date: DateTime<Utc>,
        bytes: &[u8],
        location_info: serde_json::Value,
        prompt: Option<String>,
    ) -> SkyshotResult<PathBuf> {
        let stored = self
            .insert(location, date, bytes, location_info, prompt)
            .await?;
        Ok(stored.path)
    }

    /// Return the cached image, generating and storing it on a miss
    ///
    /// Concurrent misses for the same key run `generator` once.
    pub async fn get_or_generate(
        &self,
        location: &str,
        date: DateTime<Utc>,
        generator: &dyn ImageGenerator,
    ) -> SkyshotResult<CachedImage> {
        let key = derive_key(location, &date);
        if let Some(hit) = self.get_by_key(&key).await? {
            return Ok(hit);
        }
        self.generate_coalesced(&key, location, date, generator, false)
            .await
    }

    /// Generate a fresh image and replace whatever is cached
    pub async fn regenerate(
        &self,
        location: &str,
        date: DateTime<Utc>,
        generator: &dyn ImageGenerator,
    ) -> SkyshotResult<CachedImage> {
        let key = derive_key(location, &date);
        self.generate_coalesced(&key, location, date, generator, true)
            .await
    }

    /// Remove one entry and its blob
    pub async fn remove(
        &self,
        location: &str,
        date: DateTime<Utc>,
    ) -> SkyshotResult<Option<CacheEntry>> {
        let key = derive_key(location, &date);
        let mut index = self.index.lock().await;

        let Some(entry) = index.remove(&key) else {
            return Ok(None);
        };
        if let Err(e) = self.blobs.delete_blob(&entry.blob_name).await {
            warn!("Failed to remove blob {}: {}", entry.blob_name, e);
        }
        self.metadata.persist(&index).await?;

        info!("Removed cache entry for {}", entry.location_key);
        Ok(Some(entry))
    }

    /// Remove every entry and blob, returning how many entries were dropped
    pub async fn clear(&self) -> SkyshotResult<usize> {
        let mut index = self.index.lock().await;
        let count = index.len();

        for entry in index.iter() {
            if let Err(e) = self.blobs.delete_blob(&entry.blob_name).await {
                warn!("Failed to remove blob {}: {}", entry.blob_name, e);
            }
        }
        index.clear();
        self.metadata.persist(&index).await?;

        info!("Cleared {} cache entries", count);
        Ok(count)
    }

    /// Verify every entry and delete unreferenced blobs
    pub async fn reconcile(&self) -> SkyshotResult<ReconcileReport> {
        let mut index = self.index.lock().await;
        let report = reconcile::sweep(&mut index, self.blobs.as_ref(), &self.extension).await?;
        if report.index_changed() {
            self.metadata.persist(&index).await?;
        }

        info!(
            "Reconciled cache: {} stale entries, {} orphaned blobs",
            report.purged_entries.len(),
            report.removed_orphans.len()
        );
        Ok(report)
    }

    /// Snapshot of all entries in eviction order
    pub async fn entries(&self) -> Vec<CacheEntry> {
        self.index.lock().await.iter().cloned().collect()
    }

    /// Whether metadata holds an entry for the pair (blob not checked)
    pub async fn contains(&self, location: &str, date: DateTime<Utc>) -> bool {
        let key = derive_key(location, &date);
        self.index.lock().await.contains(&key)
    }

    pub async fn len(&self) -> usize {
        self.index.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.lock().await.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn metadata_path(&self) -> &Path {
        self.metadata.path()
    }

    async fn insert(
        &self,
        location: &str,
        date: DateTime<Utc>,
        bytes: &[u8],
        location_info: serde_json::Value,
        prompt: Option<String>,
    ) -> SkyshotResult<CachedImage> {
        let key = derive_key(location, &date);
        let blob_name = key.blob_name(&self.extension);
        let mut index = self.index.lock().await;

        let path = self.blobs.write_blob(&blob_name, bytes).await?;

        let entry = CacheEntry {
            key,
            blob_name,
            location_key: location.to_string(),
            request_date: date,
            location_info,
            created_at: Utc::now(),
            prompt,
        };
        let replaced = index.insert(entry.clone()).is_some();

        eviction::evict_overflow(self.policy, &mut index, self.blobs.as_ref(), self.capacity)
            .await;
        self.metadata.persist(&index).await?;

        info!(
            "Cached image for {} on {} ({} bytes{}), {}/{} entries",
            location,
            date.format("%Y-%m-%d"),
            bytes.len(),
            if replaced { ", replaced" } else { "" },
            index.len(),
            self.capacity
        );
        Ok(CachedImage { path, entry })
    }

    async fn generate_coalesced(
        &self,
        key: &CacheKey,
        location: &str,
        date: DateTime<Utc>,
        generator: &dyn ImageGenerator,
        force: bool,
    ) -> SkyshotResult<CachedImage> {
        let slot = self.inflight.acquire(key);
        let _running = slot.lock.lock().await;
        self.generate_locked(key, location, date, generator, force)
            .await
    }

    async fn generate_locked(
        &self,
        key: &CacheKey,
        location: &str,
        date: DateTime<Utc>,
        generator: &dyn ImageGenerator,
        force: bool,
    ) -> SkyshotResult<CachedImage> {
        // Another caller may have filled the key while we waited
        if !force {
            if let Some(hit) = self.get_by_key(key).await? {
                debug!("Shared in-flight generation for {}", location);
                return Ok(hit);
            }
        }

        info!(
            "Generating image for {} on {}",
            location,
            date.format("%Y-%m-%d")
        );
        let image = generator.generate(location, date).await?;
        self.insert(location, date, &image.bytes, image.location_info, image.prompt)
            .await
    }

    #[cfg(test)]
    fn inflight_len(&self) -> usize {
        self.inflight.lock().len()
    }
}

/// Per-key generation locks, each with a count of callers holding a slot
#[derive(Default)]
struct InflightMap {
    slots: StdMutex<HashMap<CacheKey, InflightEntry>>,
}

struct InflightEntry {
    lock: Arc<Mutex<()>>,
    holders: usize,
}

impl InflightMap {
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, InflightEntry>> {
        self.slots.lock().unwrap_or_else(|poisoned| {
            warn!("Recovered from poisoned in-flight lock");
            poisoned.into_inner()
        })
    }

    fn acquire(&self, key: &CacheKey) -> InflightSlot<'_> {
        let mut slots = self.lock();
        let entry = slots.entry(key.clone()).or_insert_with(|| InflightEntry {
            lock: Arc::new(Mutex::new(())),
            holders: 0,
        });
        entry.holders += 1;
        InflightSlot {
            map: self,
            key: key.clone(),
            lock: Arc::clone(&entry.lock),
        }
    }
}

/// A caller's claim on a key's generation lock
///
/// Dropping it, on completion or cancellation, removes the key from the
/// map once no other caller holds a slot.
struct InflightSlot<'a> {
    map: &'a InflightMap,
    key: CacheKey,
    lock: Arc<Mutex<()>>,
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        let mut slots = self.map.lock();
        if let Some(entry) = slots.get_mut(&self.key) {
            entry.holders = entry.holders.saturating_sub(1);
            if entry.holders == 0 {
                slots.remove(&self.key);
            }
        }
    }
}
