//! Layered configuration: defaults, optionally overridden by a TOML file,
//! optionally overridden again by CLI flags.

use std::time::Duration;

use serde::Deserialize;

use termstream_core::config::ServiceConfig;

use crate::error::ServerError;

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Address to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Whether to wrap accepted connections in TLS.
    pub tls: bool,
    /// PEM certificate path, required when `tls` is set unless falling back
    /// to a self-signed certificate for development.
    pub cert: Option<String>,
    /// PEM private key path, paired with `cert`.
    pub key: Option<String>,
    /// Require and verify a client certificate (mutual TLS). Implies `tls`.
    pub mtls: bool,
    /// Streaming core tunables.
    pub service: ServiceConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7880,
            tls: false,
            cert: None,
            key: None,
            mtls: false,
            service: ServiceConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// The address to bind to, as `host:port`.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shape of an optional `--config <path>` TOML file. Every field is
/// optional; an absent field falls back to [`RuntimeConfig::default`] and is
/// further overridable by CLI flags.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    host: Option<String>,
    port: Option<u16>,
    tls: Option<bool>,
    cert: Option<String>,
    key: Option<String>,
    mtls: Option<bool>,
    max_sessions: Option<usize>,
    heartbeat_interval_secs: Option<u64>,
}

impl FileConfig {
    /// Load and parse a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the file cannot be read or fails
    /// to parse.
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("failed to read config '{path}': {e}")))?;
        toml::from_str(&raw).map_err(|e| ServerError::Config(format!("failed to parse config '{path}': {e}")))
    }

    /// Merge this file's values onto a base configuration. `None` fields
    /// leave the base value untouched.
    #[must_use]
    pub fn merge_onto(self, mut base: RuntimeConfig) -> RuntimeConfig {
        if let Some(host) = self.host {
            base.host = host;
        }
        if let Some(port) = self.port {
            base.port = port;
        }
        if let Some(tls) = self.tls {
            base.tls = tls;
        }
        if let Some(cert) = self.cert {
            base.cert = Some(cert);
        }
        if let Some(key) = self.key {
            base.key = Some(key);
        }
        if let Some(mtls) = self.mtls {
            base.mtls = mtls;
        }
        if let Some(max_sessions) = self.max_sessions {
            base.service.max_sessions = max_sessions;
        }
        if let Some(secs) = self.heartbeat_interval_secs {
            base.service.heartbeat_interval = Duration::from_secs(secs);
        }
        base
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_bind_address() {
        let config = RuntimeConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:7880");
    }

    #[test]
    fn file_config_overrides_only_present_fields() {
        let file = FileConfig {
            port: Some(9000),
            ..Default::default()
        };
        let merged = file.merge_onto(RuntimeConfig::default());
        assert_eq!(merged.port, 9000);
        assert_eq!(merged.host, "0.0.0.0");
    }

    #[test]
    fn file_config_parses_toml() {
        let parsed: FileConfig = toml::from_str("host = \"127.0.0.1\"\nport = 1234\n").unwrap();
        assert_eq!(parsed.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(parsed.port, Some(1234));
    }
}
