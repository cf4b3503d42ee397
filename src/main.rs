//! mdpreview - live preview of a markdown document in the browser.

mod cli;
mod config;
mod core;
mod embed;
mod logger;
mod reload;
mod render;
mod utils;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::PreviewConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = PreviewConfig::load(&cli)?;
    let root = core::ServeRoot::new(&cli.path)
        .with_context(|| format!("Cannot serve `{}`", cli.path.display()))?;

    cli::serve::serve(root, &config.serve)
}
