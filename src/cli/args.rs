//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::path::PathBuf;

/// Live preview of a markdown document in the browser
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Markdown file to preview, or a directory of documents
    #[arg(default_value = ".", value_hint = clap::ValueHint::AnyPath)]
    pub path: PathBuf,

    /// HTTP listen address, host:port (default: localhost:6969)
    #[arg(short, long)]
    pub addr: Option<String>,

    /// Port of the push endpoint on the same host (default: 35729)
    #[arg(short, long)]
    pub ws_port: Option<u16>,

    /// Quiet period in milliseconds before an edit is re-rendered
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Maximum lifetime of one browser session, in seconds
    #[arg(long, value_name = "SECS")]
    pub session_timeout: Option<u64>,

    /// Consecutive failed reads before a session gives up
    #[arg(long, value_name = "N")]
    pub max_read_failures: Option<u32>,

    /// Config file path (TOML with a [serve] table)
    #[arg(short = 'C', long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,
}
