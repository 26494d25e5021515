//! Skyshot CLI entry point

use clap::Parser;
use console::style;
use skyshot::cli::{Cli, Commands};
use skyshot::config::{Config, ConfigManager};
use skyshot::error::SkyshotResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> SkyshotResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.resolve(cli.cache_dir).await?;

    init_logging(cli.verbose, &config);

    match cli.command {
        Commands::Cache(args) => skyshot::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            skyshot::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug; RUST_LOG takes precedence
fn init_logging(verbose: u8, config: &Config) {
    let level = match verbose {
        0 => "skyshot=warn",
        1 => "skyshot=info",
        _ => "skyshot=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if config.general.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }
}
