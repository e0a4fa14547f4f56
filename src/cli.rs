//! Command-line interface for the `smipc-monitor` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::logging::Verbosity;

/// smipc-monitor - watch sensor telemetry published over shared memory
///
/// Attaches to the segments written by the GPS/IMU acquisition processes and
/// prints decoded samples. Nothing is ever written back to the producers.
#[derive(Debug, Parser)]
#[command(name = "smipc-monitor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll channels in the background until Ctrl-C
    Watch(WatchCommand),

    /// Read one channel once and print the decoded sample
    Read(ReadCommand),

    /// List known channels and their wire layouts
    Channels(ChannelsCommand),

    /// Show configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Channel to watch (repeatable); defaults to the configured list
    #[arg(long = "channel", value_name = "NAME")]
    pub channels: Vec<String>,

    /// Poll interval in milliseconds, overriding the configuration
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ReadCommand {
    /// Channel name, e.g. GGA or GPS_Position
    pub name: String,

    /// Semaphore wait in milliseconds, overriding the configuration
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ChannelsCommand {
    /// Print each schema's field table
    #[arg(short, long)]
    pub fields: bool,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Print the default configuration file path
    Path,
}

impl Cli {
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
