//! CLI command definitions and parsing
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "reqtrace",
    version,
    author = "neur0map",
    about = "Trace how values flow through a recorded HTTP capture",
    long_about = "reqtrace reads a HAR capture, discovers interesting values (identifiers, tokens, \
                  credentials), finds where a value first appears and maps which later requests \
                  consume or re-emit related values."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/reqtrace/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Tracing mode
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceMode {
    /// Walk back to the first entry containing the value
    First,
    /// Recursive dependency graph
    Full,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Trace a seed value through the capture
    Trace {
        /// HAR file with recorded traffic
        #[arg(long, value_name = "FILE")]
        har: PathBuf,

        /// Seed value to trace (e.g. an asset id or token)
        #[arg(long)]
        value: String,

        #[arg(short, long, value_enum, default_value = "full")]
        mode: TraceMode,

        /// Override the configured maximum depth
        #[arg(long)]
        max_depth: Option<usize>,

        /// Override the configured node budget
        #[arg(long)]
        max_nodes: Option<usize>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Discover and rank candidate seed values
    Discover {
        #[arg(long, value_name = "FILE")]
        har: PathBuf,

        /// Maximum number of candidates (defaults to seeds.limit)
        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Summarize pattern frequencies and endpoints
    Analyze {
        #[arg(long, value_name = "FILE")]
        har: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Validate the configuration and compile its patterns
    Validate,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
