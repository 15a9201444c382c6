//! Server configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file
//! at all) yields a working configuration:
//!
//! ```toml
//! address = "127.0.0.1"
//! port = 4242
//! user_capacity = 20
//! room_capacity = 10
//! log_filter = "info"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a [`CollabServer`](crate::CollabServer) and its transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the transport listens on.
    pub address: String,
    /// Port the transport listens on.
    pub port: u16,
    /// Number of users to reserve directory space for.
    pub user_capacity: usize,
    /// Number of rooms to reserve directory space for.
    pub room_capacity: usize,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 4242,
            user_capacity: 20,
            room_capacity: 10,
            log_filter: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// The `address:port` pair to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Reject configurations the transport cannot bind.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::Invalid("address must not be empty"));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr(), "127.0.0.1:4242");
    }

    #[test]
    fn fields_override_defaults() {
        let config = ServerConfig::from_toml_str("port = 5000\nroom_capacity = 64\n").unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.room_capacity, 64);
        assert_eq!(config.user_capacity, 20);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = ServerConfig::from_toml_str("prot = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_port_is_invalid() {
        let err = ServerConfig::from_toml_str("port = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "address = \"0.0.0.0\"").unwrap();

        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:4242");
    }

    #[test]
    fn load_missing_file_fails() {
        let err = ServerConfig::load("/nonexistent/collab.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
