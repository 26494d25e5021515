//! Configuration schema for Skyshot
//!
//! Configuration is stored at `~/.config/skyshot/config.toml`

use crate::cache::EvictionPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Image cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl GeneralConfig {
    /// Accepted values for `log_format`
    pub const LOG_FORMATS: [&'static str; 2] = ["text", "json"];

    /// Whether logs are emitted as JSON lines
    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Image cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding blobs and `metadata.json`
    pub dir: PathBuf,

    /// Maximum number of cached images
    pub capacity: usize,

    /// Victim selection when capacity is exceeded
    pub eviction: EvictionPolicy,

    /// File extension for stored blobs
    pub extension: String,
}

impl CacheConfig {
    /// Default cache directory
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skyshot")
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
            capacity: 100,
            eviction: EvictionPolicy::Fifo,
            extension: "png".to_string(),
        }
    }
}
