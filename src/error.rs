//! Error types for Skyshot
//!
//! All modules use `SkyshotResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Skyshot operations
pub type SkyshotResult<T> = Result<T, SkyshotError>;

/// All errors that can occur in Skyshot
#[derive(Error, Debug)]
pub enum SkyshotError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Input errors
    #[error("Invalid date: {0}. Expected RFC 3339 or YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid location: {0:?}")]
    InvalidLocation(String),

    // Cache errors
    #[error("Failed to write blob {name}: {source}")]
    BlobWrite {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to persist cache metadata to {path}: {source}")]
    MetadataPersist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid blob name {0:?}: must be a single file name")]
    InvalidBlobName(String),

    #[error("Cache entry not found: {0}")]
    EntryNotFound(String),

    // Generation pipeline errors
    #[error("Image generation failed: {0}")]
    Generation(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl SkyshotError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidDate(_) => Some("Use a date like 2024-05-01 or 2024-05-01T15:00:00Z"),
            Self::ConfigInvalid { .. } => Some("Run: skyshot config init --force"),
            Self::MetadataPersist { .. } | Self::BlobWrite { .. } => {
                Some("Check free space and permissions of the cache directory")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SkyshotError::InvalidDate("yesterday".to_string());
        assert!(err.to_string().contains("Invalid date: yesterday"));
    }

    #[test]
    fn error_hint() {
        let err = SkyshotError::InvalidDate("nope".to_string());
        assert!(err.hint().is_some());
        assert_eq!(SkyshotError::EntryNotFound("x".to_string()).hint(), None);
    }
}
