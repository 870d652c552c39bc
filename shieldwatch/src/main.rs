/// Main module for shieldwatch
///
/// Polls the attack provider, detects attacks starting and ending, and posts a
/// notification for each to every registered webhook.
mod config;
mod console;
mod controller;
mod delivery;
mod detector;
mod error;
mod logger;
mod message;
mod notifier;
mod operator;
mod provider;
mod registry;
mod render;
mod runnable;
mod watcher;
mod worker_pool;

#[cfg(test)]
mod testing;

use clap::Parser;
use config::{ConfigStore, log_key_errors};
use controller::Controller;
use std::path::PathBuf;

/// Define command line arguments using clap
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file, created with defaults if missing
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "SHIELDWATCH_CONFIG",
        default_value = "shieldwatch.toml"
    )]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let logger = logger::init();

    let cli = Cli::parse();
    tracing::debug!("Config path: {:?}", cli.config);

    let store = ConfigStore::new(cli.config);
    let (config, key_errors) = match store.load_or_create() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load configuration: {:?}", e);
            std::process::exit(1);
        }
    };
    log_key_errors("load", &key_errors);
    tracing::info!("Using config file {}", store.path().display());

    let code = match Controller::new(config, store).start().await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("shieldwatch stopped: {:?}", e);
            1
        }
    };

    // stdin reads can't be cancelled, so exit instead of waiting on the runtime
    drop(logger);
    std::process::exit(code);
}
