//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Transcodes uploaded audio to a browser-quality rendition.
#[derive(Parser, Debug)]
#[command(name = "audio-transcode-worker", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "/config/worker.yaml", env = "CONFIG_PATH", global = true)]
    pub config: PathBuf,

    /// Increase logging verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns the log level from verbosity flags, falling back to `configured`.
    pub fn log_level<'a>(&self, configured: &'a str) -> &'a str {
        match self.verbose {
            0 => configured,
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the notification queue and transcode uploads until interrupted.
    Run,

    /// Validate the configuration file without starting.
    #[command(name = "config-validate")]
    ConfigValidate,

    /// Display the effective configuration after environment overrides.
    #[command(name = "config-show")]
    ConfigShow,

    /// Run one notification body from a file without touching the queue.
    #[command(name = "process-message")]
    ProcessMessage {
        /// File containing the notification JSON.
        file: PathBuf,
    },
}
