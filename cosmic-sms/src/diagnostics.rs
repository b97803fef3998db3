//! Command-Line Interface and Logging
//!
//! Argument parsing and `tracing` subscriber setup for the inbox binary.
//! Logs go to stderr so command output on stdout stays clean.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cosmic_sms_core::AggregationPolicy;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// COSMIC SMS command-line interface
#[derive(Parser, Debug)]
#[command(name = "cosmic-sms")]
#[command(about = "Browse and answer SMS conversations from the COSMIC Desktop", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to ~/.config/cosmic/cosmic-sms/sms.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(short, long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Enable JSON structured logging
    #[arg(long)]
    pub json_logs: bool,

    /// Show timestamps in logs
    #[arg(long)]
    pub timestamps: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Inbox commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List conversations, newest first
    Conversations {
        /// Print as JSON
        #[arg(long)]
        json: bool,

        /// Override the configured aggregation policy
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },

    /// Show one thread, oldest message first
    Thread {
        /// Thread ID
        thread_id: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send a message and show the thread once it is reconciled
    Send {
        /// Thread ID
        thread_id: String,

        /// Recipient address
        address: String,

        /// Message text
        #[arg(required = true, num_args = 1..)]
        body: Vec<String>,
    },

    /// Import messages from a JSON array into the local log
    Import {
        /// JSON file path
        file: PathBuf,
    },

    /// Show current configuration
    DumpConfig,
}

/// Aggregation policy on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    FirstSeen,
    MostRecent,
}

impl From<PolicyArg> for AggregationPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::FirstSeen => AggregationPolicy::FirstSeen,
            PolicyArg::MostRecent => AggregationPolicy::MostRecent,
        }
    }
}

/// Initialize logging based on CLI configuration
pub fn init_logging(cli: &Cli) -> Result<()> {
    let log_level = cli.log_level.parse::<Level>().with_context(|| {
        format!(
            "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
            cli.log_level
        )
    })?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.as_str()))
        .context("Failed to create log filter")?;

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    match (cli.json_logs, cli.timestamps) {
        (true, true) => subscriber.json().init(),
        (true, false) => subscriber.without_time().json().init(),
        (false, true) => subscriber.init(),
        (false, false) => subscriber.without_time().init(),
    }

    debug!(
        "Logging initialized: level={}, json={}, timestamps={}",
        log_level, cli.json_logs, cli.timestamps
    );

    Ok(())
}
