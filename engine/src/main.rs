//! Drover - Entry Point
//!
//! Operator-facing engine for dispatching commands to a device fleet and
//! tracking per-device completion.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use drover::app::options::AppOptions;
use drover::app::run::run;
use drover::config::Settings;
use drover::logs::{init_logging, LogOptions};
use drover::utils::version_info;

use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "/etc/drover/settings.json";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version).unwrap());
        return;
    }

    // Locate the settings file
    let config_path = cli_args
        .get("config")
        .cloned()
        .or_else(|| env::var("DROVER_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config_path = PathBuf::from(config_path);

    let settings = if config_path.exists() {
        match Settings::load(&config_path) {
            Ok(settings) => settings,
            Err(e) => {
                error!("Unable to read settings file {}: {}", config_path.display(), e);
                return;
            }
        }
    } else {
        Settings::default()
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    // Run the engine
    let options = AppOptions::from_settings(&settings);
    info!("Running drover {} with options: {:?}", version.version, options);
    let result = run(options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run drover: {e}");
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).unwrap();
        let mut sigint = signal(SignalKind::interrupt()).unwrap();

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, shutting down...");
    }
}
