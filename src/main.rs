mod cli;
mod clipboard;
mod config;
mod convert;
mod dispatch;
mod parse;
mod rates;
mod watch;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

use config::AppConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "config load failed");
            eprintln!("clipconvd: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Command::Watch => {
            if let Err(e) = watch::run(config, cli.config).await {
                tracing::error!(error = %e, "watcher failed");
                eprintln!("clipconvd watch: {e}");
                std::process::exit(1);
            }
        }
        Command::Convert { text } => {
            // Blocking rate I/O must not run on the async runtime.
            let result =
                tokio::task::spawn_blocking(move || watch::convert_once(&config, &text)).await;
            match result {
                Ok(Ok(Some(outcome))) => {
                    println!("{} = {}", outcome.original, outcome.converted);
                }
                Ok(Ok(None)) => {
                    println!("no conversion");
                    std::process::exit(1);
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "convert failed");
                    eprintln!("clipconvd convert: {e}");
                    std::process::exit(1);
                }
                Err(e) => {
                    tracing::error!(error = %e, "convert task failed");
                    eprintln!("clipconvd convert: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::RefreshRates => {
            let result =
                tokio::task::spawn_blocking(move || watch::refresh_rates(&config)).await;
            match result {
                Ok(Ok(snapshot)) => {
                    println!(
                        "refreshed {} rates (base {})",
                        snapshot.rates.len(),
                        snapshot.base
                    );
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "rate refresh failed");
                    eprintln!("clipconvd refresh-rates: {e}");
                    std::process::exit(1);
                }
                Err(e) => {
                    tracing::error!(error = %e, "refresh task failed");
                    eprintln!("clipconvd refresh-rates: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
