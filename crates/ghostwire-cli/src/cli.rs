use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ghostwire")]
#[command(version, about = "Legacy code migration pipeline", long_about = None)]
pub struct Cli {
    /// Pipeline config file (TOML); defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Debug logging for ghostwire crates
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Report format on stdout
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run files through parse, translate, test generation and risk evaluation
    Run {
        /// Legacy source files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Source language; detected from each file's extension when omitted
        #[arg(short, long)]
        language: Option<String>,

        /// Target language; each source language's default when omitted
        #[arg(short, long)]
        target: Option<String>,

        /// Seconds to wait for every file to finish
        #[arg(long, default_value = "30")]
        timeout_secs: u64,

        /// Exit with status 2 when any file needs human review
        #[arg(long)]
        fail_on_review: bool,
    },

    /// Score a risk evaluation request (JSON) without running the pipeline
    Score {
        /// File holding `{ "translation_result": .., "parse_result": .. }`
        request: PathBuf,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ConfigAction {
    /// Print the effective config as TOML
    Show,
    /// Load and validate the config
    Validate,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
