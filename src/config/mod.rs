//! Preview configuration.
//!
//! Defaults, optionally overridden by a TOML file (`--config`), then by
//! command-line flags.
//!
//! # Sections
//!
//! | Section   | Purpose                                             |
//! |-----------|-----------------------------------------------------|
//! | `[serve]` | Listen addresses, debounce, session limits          |

mod error;
mod serve;

pub use error::ConfigError;
pub use serve::{DEFAULT_ADDR, ServeConfig};

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreviewConfig {
    /// Preview server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl PreviewConfig {
    /// Load configuration from CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_path(path)
                .with_context(|| format!("Failed to load config `{}`", path.display()))?,
            None => Self::default(),
        };

        config.apply_cli(cli);
        config.serve.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Command-line flags win over the file.
    fn apply_cli(&mut self, cli: &Cli) {
        let serve = &mut self.serve;
        if let Some(addr) = &cli.addr {
            serve.addr.clone_from(addr);
        }
        if let Some(port) = cli.ws_port {
            serve.ws_port = port;
        }
        if let Some(ms) = cli.debounce_ms {
            serve.debounce_ms = ms;
        }
        if let Some(secs) = cli.session_timeout {
            serve.session_timeout_secs = secs;
        }
        if let Some(n) = cli.max_read_failures {
            serve.max_read_failures = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use tempfile::TempDir;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("mdpreview").chain(args.iter().copied()))
    }

    #[test]
    fn test_load_defaults() {
        let config = PreviewConfig::load(&parse(&[])).unwrap();
        assert_eq!(config.serve, ServeConfig::default());
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mdpreview.toml");
        fs::write(&path, "[serve]\naddr = \"127.0.0.1:7000\"\ndebounce_ms = 80\n").unwrap();

        let cli = parse(&["--config", path.to_str().unwrap(), "--debounce-ms", "120"]);
        let config = PreviewConfig::load(&cli).unwrap();

        assert_eq!(config.serve.addr, "127.0.0.1:7000");
        assert_eq!(config.serve.debounce_ms, 120);
    }

    #[test]
    fn test_missing_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.toml");

        let err = PreviewConfig::load(&parse(&["-C", path.to_str().unwrap()])).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Io(..))
        ));
    }

    #[test]
    fn test_invalid_flag_value_rejected() {
        let err = PreviewConfig::load(&parse(&["--session-timeout", "0"])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(matches!(
            PreviewConfig::from_str("[build]\nminify = true"),
            Err(ConfigError::Toml(_))
        ));
    }
}
