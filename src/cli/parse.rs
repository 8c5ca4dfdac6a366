//! CLI parse: clap types for stackgen. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// stackgen - generate backend projects from a prompt
#[derive(Parser)]
#[command(name = "stackgen")]
#[command(about = "Generate a Node.js + Express + TypeScript backend from a prompt")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding config/ and used to resolve a relative workspace_root
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue a generation job
    Generate {
        /// What to build
        prompt: String,
        /// Run the job now and wait for its result
        #[arg(long)]
        wait: bool,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Status poll interval while waiting (milliseconds)
        #[arg(long, default_value = "500")]
        poll_ms: u64,
    },
    /// Plan a project without generating files
    Plan {
        prompt: String,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Process queued jobs until none are left
    Work {
        #[arg(long, default_value = "500")]
        poll_ms: u64,
    },
    /// Print the effective configuration as TOML
    Config,
    /// Report provider readiness and job counts
    Health {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}
