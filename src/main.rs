use std::path::PathBuf;

use clap::Parser;
use log::{error, info};
use mac_address::MacAddress;

mod config;
mod decoder;
mod messages;
mod scanner;
mod session;
mod stability;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Print the weight broadcast by a Bluetooth LE smart scale.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Config file; ./config.toml is read if present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scale MAC address, e.g. ED:67:39:0A:C5:C0
    #[arg(short, long)]
    address: Option<MacAddress>,

    /// How long to scan, in seconds [default: 240]
    #[arg(short, long)]
    duration: Option<u64>,

    /// Output format for readings
    #[arg(short, long, value_enum)]
    format: Option<config::OutputFormat>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let args = Args::parse();
    let (config_path, required) = match args.config {
        Some(path) => (path, true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };
    let settings = config::AppConfig::load(&config_path, required)?
        .override_with(args.address, args.duration, args.format)
        .session_settings();
    info!("Settings: {:?}", settings);

    let scanner = scanner::BleScanner::first_adapter().await?;
    let mut session = session::Session::new(scanner, settings, std::io::stdout());

    session.run(shutdown_signal()).await
}

/// Resolves on Ctrl-C or SIGTERM. The SIGTERM handler is installed before
/// this returns, so a signal sent right after the call is not lost.
fn shutdown_signal() -> impl Future<Output = ()> {
    #[cfg(unix)]
    let terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate());

    async move {
        let ctrl_c = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for Ctrl-C: {}", err);
                std::future::pending::<()>().await
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            match terminate {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(err) => {
                    error!("Cannot listen for SIGTERM: {}", err);
                    std::future::pending::<()>().await
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl-C"),
            _ = terminate => info!("Received SIGTERM"),
        }
    }
}
