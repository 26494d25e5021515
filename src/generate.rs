//! Boundary to the image generation pipeline
//!
//! Geocoding, weather lookup, prompt construction and the image API all
//! live behind [`ImageGenerator`]. The cache only sees what comes out.

use crate::error::SkyshotResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Output of one generation run
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    /// Image payload
    pub bytes: Vec<u8>,

    /// Location record (city, state, coordinates), stored verbatim
    pub location_info: serde_json::Value,

    /// Prompt that produced the image
    pub prompt: Option<String>,
}

/// Produces an image for a location and date
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, location: &str, date: DateTime<Utc>) -> SkyshotResult<GeneratedImage>;
}
