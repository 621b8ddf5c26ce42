//! Command-line interface for Treeline.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Treeline - cluster serving coordination for Certificate Transparency
/// log nodes.
#[derive(Parser)]
#[command(name = "treeline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TREELINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "TREELINE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run a Treeline node
    Serve {
        /// Node ID
        #[arg(short, long, env = "TREELINE_NODE_ID")]
        node_id: Option<String>,

        /// Hostname clients reach this node's log frontend on
        #[arg(long)]
        hostname: Option<String>,

        /// Port of this node's log frontend
        #[arg(long)]
        log_port: Option<u16>,

        /// Bind address for the metrics endpoint
        #[arg(long)]
        metrics_addr: Option<String>,
    },

    /// Print version information
    Version,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
