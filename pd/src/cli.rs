//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::debug;

/// PromptDaemon - stored prompt templates, rendered in a sandbox
#[derive(Parser)]
#[command(
    name = "pd",
    about = "Store prompt templates by path and render them in a sandbox",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List stored prompts
    List {
        /// Only the direct children of this path
        #[arg(short, long)]
        parent: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one prompt
    Show {
        path: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Create or replace a prompt
    Put {
        path: String,

        #[command(flatten)]
        messages: MessageArgs,
    },

    /// Delete a prompt (succeeds if it does not exist)
    Delete { path: String },

    /// Render a prompt and print both messages as JSON
    Render {
        path: String,

        /// Parameters as a JSON object
        #[arg(short, long, conflicts_with = "params_file")]
        params: Option<String>,

        /// Read parameters from a JSON file
        #[arg(long, value_name = "FILE")]
        params_file: Option<PathBuf>,
    },

    /// Compile a template file and report syntax errors
    Check { file: PathBuf },
}

/// Template sources for `put`, inline or from files
#[derive(Debug, Args)]
pub struct MessageArgs {
    /// User message template
    #[arg(short, long, required_unless_present = "user_file", conflicts_with = "user_file")]
    pub user: Option<String>,

    /// Read the user message template from a file
    #[arg(long, value_name = "FILE")]
    pub user_file: Option<PathBuf>,

    /// System message template
    #[arg(short, long, conflicts_with = "system_file")]
    pub system: Option<String>,

    /// Read the system message template from a file
    #[arg(long, value_name = "FILE")]
    pub system_file: Option<PathBuf>,
}

/// Output format for list/show
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Html,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            _ => Err(format!("Unknown format: {}. Use text, json, or html", s)),
        }
    }
}

/// Path of the log file written by `pd`
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("promptdaemon")
        .join("logs")
        .join("pd.log")
}
