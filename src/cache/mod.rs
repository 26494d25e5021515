//! Persistent image cache
//!
//! Sits in front of the image generation pipeline and stores one image per
//! (location, calendar day). Layout on disk:
//!
//! ```text
//! <cache dir>/
//!   metadata.json        key -> entry record, rewritten on every mutation
//!   <sha256 hex>.png     one blob per key
//! ```
//!
//! # Consistency
//!
//! - Blobs are written to a temp file, synced and renamed into place before
//!   their entry is registered, so the index never names a partial blob.
//! - Entries whose blob name is not `<key>.<ext>` are dropped at load, so
//!   every path the cache touches stays inside its directory.
//! - A blob deleted out-of-band is noticed on the next lookup of its key;
//!   the entry is purged and the lookup is a miss.
//! - An unreadable `metadata.json` at startup yields an empty cache.
//!
//! # Eviction
//!
//! | Policy | Victim | Reads reorder? |
//! |--------|--------|----------------|
//! | `fifo` (default) | oldest insertion | no |
//! | `lru` | least recent hit or insertion | yes |
//!
//! One victim per insertion that exceeds capacity.

pub mod blob;
pub mod entry;
pub mod eviction;
pub mod key;
pub mod metadata;
pub mod reconcile;
pub mod store;

pub use blob::{BlobStore, FsBlobStore};
pub use entry::CacheEntry;
pub use eviction::EvictionPolicy;
pub use key::{derive_key, parse_request_date, CacheKey};
pub use metadata::{MetadataIndex, MetadataStore, METADATA_FILE};
pub use reconcile::ReconcileReport;
pub use store::{CachedImage, ImageCache};
