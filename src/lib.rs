//! Skyshot - durable cache for generated weather images
//!
//! Keeps one generated image per (location, calendar day) on disk, bounded
//! by an entry count, so the expensive image generation call only runs on
//! a true miss.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod generate;

pub use cache::{CachedImage, ImageCache};
pub use error::{SkyshotError, SkyshotResult};
pub use generate::{GeneratedImage, ImageGenerator};
