//! CLI argument parsing.

use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments of the check.
#[derive(Parser, Debug, Clone)]
#[command(name = "kubesight-check")]
#[command(about = "Publish cluster state metrics from a KubeSight engine")]
#[command(version)]
pub struct CheckArgs {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long, default_value = "kubesight.json5")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Run a single check cycle and exit.
    #[arg(long)]
    pub once: bool,
}
