//! Cache entry record

use crate::cache::key::CacheKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata describing one cached image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Key this entry is stored under (the map key on disk)
    #[serde(skip)]
    pub key: CacheKey,

    /// File name of the blob in the cache directory
    pub blob_name: String,

    /// Location identifier as supplied by the caller
    pub location_key: String,

    /// Request timestamp in UTC
    #[serde(rename = "date")]
    pub request_date: DateTime<Utc>,

    /// Opaque location record from the generation pipeline
    pub location_info: serde_json::Value,

    /// When this entry was stored
    pub created_at: DateTime<Utc>,

    /// Prompt that produced the image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}
