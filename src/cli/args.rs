//! CLI argument definitions using clap derive

use crate::cache::parse_request_date;
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Skyshot - durable cache for generated weather images
///
/// Inspect and maintain the on-disk cache that sits in front of the
/// image generation pipeline.
#[derive(Parser, Debug)]
#[command(name = "skyshot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SKYSHOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache directory (overrides cache.dir)
    #[arg(long, global = true, env = "SKYSHOT_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect and maintain the image cache
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for list command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached images in eviction order
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Print the cached image path for a location and date
    Get {
        /// Location identifier (e.g. a ZIP code)
        location: String,

        /// Request date, RFC 3339 or YYYY-MM-DD (defaults to now)
        #[arg(short, long, value_parser = parse_date)]
        date: Option<DateTime<Utc>>,

        /// Print the full entry as JSON
        #[arg(long)]
        json: bool,
    },

    /// Store an image file under a location and date
    Put {
        /// Location identifier (e.g. a ZIP code)
        location: String,

        /// Image file to store
        file: PathBuf,

        /// Request date, RFC 3339 or YYYY-MM-DD (defaults to now)
        #[arg(short, long, value_parser = parse_date)]
        date: Option<DateTime<Utc>>,

        /// Prompt that produced the image
        #[arg(long)]
        prompt: Option<String>,

        /// Location record as JSON
        #[arg(long, value_parser = parse_json)]
        info: Option<serde_json::Value>,
    },

    /// Remove the cached image for a location and date
    Remove {
        /// Location identifier (e.g. a ZIP code)
        location: String,

        /// Request date, RFC 3339 or YYYY-MM-DD (defaults to now)
        #[arg(short, long, value_parser = parse_date)]
        date: Option<DateTime<Utc>>,
    },

    /// Drop entries with missing images and delete unreferenced images
    Reconcile,

    /// Remove every cached image
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

fn parse_date(s: &str) -> Result<DateTime<Utc>, String> {
    parse_request_date(s).map_err(|e| e.to_string())
}

fn parse_json(s: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}"))
}
