//! Durable metadata: an ordered map of key to entry
//!
//! The whole index is rewritten on every mutation. Writes go to a temp file
//! in the same directory and are renamed over `metadata.json`, so a crash
//! leaves either the old or the new file, never a truncated one.

use crate::cache::blob::replace_file;
use crate::cache::entry::CacheEntry;
use crate::cache::key::CacheKey;
use crate::error::{SkyshotError, SkyshotResult};
use lru::LruCache;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Metadata file name inside the cache directory
pub const METADATA_FILE: &str = "metadata.json";

/// Key to entry map that remembers eviction order
///
/// Backed by an unbounded [`LruCache`]: its least-recent end is the next
/// victim. Inserting a new key places it last, replacing an existing key
/// keeps its position, and only [`touch`](Self::touch) reorders.
pub struct MetadataIndex {
    entries: LruCache<CacheKey, CacheEntry>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up without changing the order
    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.peek(key)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }

    /// Insert or wholesale replace, returning the previous entry
    pub fn insert(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        if let Some(slot) = self.entries.peek_mut(&entry.key) {
            return Some(std::mem::replace(slot, entry));
        }
        self.entries.put(entry.key.clone(), entry)
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.pop(key)
    }

    /// Next key in eviction order
    pub fn front(&self) -> Option<&CacheKey> {
        self.entries.peek_lru().map(|(key, _)| key)
    }

    /// Move a key to the back of the order. Returns true if the order changed.
    pub fn touch(&mut self, key: &CacheKey) -> bool {
        let already_last = self.entries.iter().next().is_some_and(|(k, _)| k == key);
        if already_last || !self.entries.contains(key) {
            return false;
        }
        self.entries.promote(key);
        true
    }

    /// Entries in eviction order
    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry> + '_ {
        self.entries.iter().rev().map(|(_, entry)| entry)
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> + '_ {
        self.entries.iter().rev().map(|(key, _)| key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for MetadataIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetadataIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

impl Serialize for MetadataIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter().map(|entry| (entry.key.as_str(), entry)))
    }
}

impl<'de> Deserialize<'de> for MetadataIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(IndexVisitor)
    }
}

struct IndexVisitor;

impl<'de> Visitor<'de> for IndexVisitor {
    type Value = MetadataIndex;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of cache keys to cache entries")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut index = MetadataIndex::new();
        while let Some((raw, mut entry)) = access.next_entry::<String, CacheEntry>()? {
            entry.key = CacheKey::parse(&raw).ok_or_else(|| {
                <A::Error as de::Error>::custom(format!("invalid cache key {:?}", raw))
            })?;
            if !entry.key.owns_blob(&entry.blob_name) {
                warn!(
                    "Dropping cache entry {} with foreign blob name {:?}",
                    entry.key, entry.blob_name
                );
                continue;
            }
            index.insert(entry);
        }
        Ok(index)
    }
}

/// Backing file for the metadata index
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    /// Store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by `metadata.json` inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(METADATA_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the index. A missing or unreadable file yields an empty index.
    pub async fn load(&self) -> MetadataIndex {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("No cache metadata at {}: {}", self.path.display(), e);
                return MetadataIndex::new();
            }
        };

        match serde_json::from_str::<MetadataIndex>(&content) {
            Ok(index) => {
                debug!("Loaded {} cache entries", index.len());
                index
            }
            Err(e) => {
                warn!(
                    "Discarding unreadable cache metadata {}: {}",
                    self.path.display(),
                    e
                );
                MetadataIndex::new()
            }
        }
    }

    /// Rewrite the backing file from `index`
    pub async fn persist(&self, index: &MetadataIndex) -> SkyshotResult<()> {
        let content = serde_json::to_string_pretty(index)?;

        replace_file(&self.path, content.as_bytes())
            .await
            .map_err(|source| SkyshotError::MetadataPersist {
                path: self.path.clone(),
                source,
            })?;

        debug!("Persisted {} cache entries", index.len());
        Ok(())
    }
}
