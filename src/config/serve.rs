//! `[serve]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! addr = "localhost:6969"      # HTTP listen address
//! ws_port = 35729              # Push endpoint port (same host)
//! debounce_ms = 50             # Quiet period before a re-render
//! session_timeout_secs = 600   # Hard lifetime of one browser session
//! max_read_failures = 3        # Consecutive read errors before giving up
//! ```
//!
//! Use `addr = "0.0.0.0:6969"` to make the preview reachable from LAN.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::reload::server::DEFAULT_WS_PORT;
use crate::reload::session::{DEFAULT_MAX_READ_FAILURES, SessionConfig};

/// Default HTTP listen address.
pub const DEFAULT_ADDR: &str = "localhost:6969";

/// Preview server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    /// HTTP listen address, `host:port`.
    pub addr: String,

    /// Push endpoint port. Tried upward when busy.
    pub ws_port: u16,

    /// Debounce window in milliseconds.
    pub debounce_ms: u64,

    /// Maximum session lifetime in seconds.
    pub session_timeout_secs: u64,

    /// Consecutive read failures tolerated per session.
    pub max_read_failures: u32,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            ws_port: DEFAULT_WS_PORT,
            debounce_ms: 50,
            session_timeout_secs: 600,
            max_read_failures: DEFAULT_MAX_READ_FAILURES,
        }
    }
}

impl ServeConfig {
    /// Split `addr` into host and port.
    ///
    /// Accepts `host:port` and `[v6]:port`; brackets are stripped from the host.
    pub fn host_port(&self) -> Result<(&str, u16), ConfigError> {
        let invalid = || ConfigError::Validation(format!("serve.addr `{}` is not host:port", self.addr));

        let (host, port) = self.addr.rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid());
        }
        Ok((host, port))
    }

    /// Per-session tuning derived from this section.
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            timeout: Duration::from_secs(self.session_timeout_secs),
            max_read_failures: self.max_read_failures,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.host_port()?;

        let positive = [
            ("serve.debounce_ms", self.debounce_ms),
            ("serve.session_timeout_secs", self.session_timeout_secs),
            ("serve.max_read_failures", u64::from(self.max_read_failures)),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{field} must be greater than 0")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreviewConfig;

    #[test]
    fn test_serve_config() {
        let config = PreviewConfig::from_str(
            "[serve]\naddr = \"0.0.0.0:8080\"\nws_port = 9000\ndebounce_ms = 200",
        )
        .unwrap();

        assert_eq!(config.serve.addr, "0.0.0.0:8080");
        assert_eq!(config.serve.ws_port, 9000);
        assert_eq!(config.serve.debounce_ms, 200);
        assert_eq!(config.serve.session_timeout_secs, 600);
    }

    #[test]
    fn test_serve_config_defaults() {
        let config = PreviewConfig::from_str("").unwrap();

        assert_eq!(config.serve, ServeConfig::default());
        assert_eq!(config.serve.addr, "localhost:6969");
        assert_eq!(config.serve.ws_port, 35729);
        assert_eq!(config.serve.max_read_failures, 3);
    }

    #[test]
    fn test_serve_config_unknown_field() {
        assert!(PreviewConfig::from_str("[serve]\nport = 1").is_err());
    }

    #[test]
    fn test_host_port() {
        let mut config = ServeConfig::default();
        assert_eq!(config.host_port().unwrap(), ("localhost", 6969));

        config.addr = "[::1]:8080".into();
        assert_eq!(config.host_port().unwrap(), ("::1", 8080));

        for bad in ["localhost", ":80", "host:http", "host:70000"] {
            config.addr = bad.into();
            assert!(config.host_port().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_session_config() {
        let config = ServeConfig {
            debounce_ms: 75,
            session_timeout_secs: 30,
            max_read_failures: 5,
            ..ServeConfig::default()
        };
        let session = config.session();
        assert_eq!(session.debounce, Duration::from_millis(75));
        assert_eq!(session.timeout, Duration::from_secs(30));
        assert_eq!(session.max_read_failures, 5);
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(ServeConfig::default().validate().is_ok());

        let config = ServeConfig {
            debounce_ms: 0,
            ..ServeConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("serve.debounce_ms"));

        let config = ServeConfig {
            max_read_failures: 0,
            ..ServeConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }
}
