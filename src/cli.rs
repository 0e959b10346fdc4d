use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "clipconvd", about = "Clipboard unit, currency, and timestamp converter")]
pub struct Cli {
    /// Config file path (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Watch the clipboard and convert recognized content
    Watch,

    /// Convert a single text and print the result
    Convert {
        /// Text to convert, e.g. "0.3 in" or "1555522011"
        text: String,
    },

    /// Fetch fresh exchange rates, bypassing the cache freshness window
    RefreshRates,
}
