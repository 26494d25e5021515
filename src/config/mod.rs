//! Configuration management for Skyshot
//!
//! Settings come from `config.toml` (defaults when absent), are checked
//! before anything opens the cache, and the cache directory can be
//! overridden per invocation with `--cache-dir` / `SKYSHOT_CACHE_DIR`.

pub mod schema;

pub use schema::{CacheConfig, Config, GeneralConfig};

use crate::cache::key::is_plain_extension;
use crate::error::{SkyshotError, SkyshotResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skyshot")
            .join("config.toml")
    }

    /// Load configuration, falling back to defaults if not present
    pub async fn load(&self) -> SkyshotResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration and apply a cache directory override
    pub async fn resolve(&self, cache_dir: Option<PathBuf>) -> SkyshotResult<Config> {
        let mut config = self.load().await?;
        if let Some(dir) = cache_dir {
            debug!("Cache directory overridden: {}", dir.display());
            config.cache.dir = dir;
        }
        Ok(config)
    }

    /// Load and validate configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> SkyshotResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| SkyshotError::io(format!("reading config from {}", path.display()), e))?;

        let config: Config = toml::from_str(&content).map_err(|e| SkyshotError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        validate(&config).map_err(|reason| SkyshotError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> SkyshotResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            SkyshotError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    async fn ensure_config_dir(&self) -> SkyshotResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SkyshotError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

/// Check values the schema alone cannot express
fn validate(config: &Config) -> Result<(), String> {
    if config.cache.capacity == 0 {
        return Err("cache.capacity must be at least 1".to_string());
    }
    if !is_plain_extension(&config.cache.extension) {
        return Err(format!(
            "cache.extension {:?} must be letters and digits only",
            config.cache.extension
        ));
    }
    if !GeneralConfig::LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(format!(
            "general.log_format {:?} must be one of {}",
            config.general.log_format,
            GeneralConfig::LOG_FORMATS.join(", ")
        ));
    }
    Ok(())
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
