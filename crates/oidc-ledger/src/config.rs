//! Ledger configuration.
//!
//! Configuration is organized into sections for the client cache, the token
//! codec limits, lookup behaviour and background pruning. All sections have
//! defaults, so an empty document is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_PAYLOAD_BYTES};

/// Root ledger configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [client_cache]
/// enabled = true
/// ttl = "5m"
///
/// [codec]
/// max_depth = 32
/// max_payload_bytes = 65536
///
/// [lookup]
/// include_state_in_untyped_lookup = true
///
/// [pruning]
/// enabled = true
/// interval = "15m"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Registered client cache.
    pub client_cache: ClientCacheConfig,

    /// Token codec limits.
    pub codec: CodecConfig,

    /// Token lookup behaviour.
    pub lookup: LookupConfig,

    /// Background removal of expired grants.
    pub pruning: PruningConfig,
}

/// Registered client cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientCacheConfig {
    /// Wrap the client directory in a cache.
    pub enabled: bool,

    /// How long a cached client stays valid.
    /// `None` keeps entries until they are invalidated.
    #[serde(with = "humantime_serde")]
    pub ttl: Option<Duration>,
}

impl Default for ClientCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Some(Duration::from_secs(300)),
        }
    }
}

/// Token codec limits applied to every stored metadata payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Maximum nesting depth of a payload.
    pub max_depth: usize,

    /// Maximum size of a payload in bytes.
    pub max_payload_bytes: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

/// Token lookup configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Whether a lookup without a token kind also matches `state` values.
    /// Disable to require `find_by_state` for state lookups.
    pub include_state_in_untyped_lookup: bool,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            include_state_in_untyped_lookup: true,
        }
    }
}

/// Background pruning configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PruningConfig {
    /// Run the pruning task.
    pub enabled: bool,

    /// Time between pruning runs.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(15 * 60),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// The configuration file could not be read.
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        /// Path of the file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration document could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl LedgerConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML and
    /// `ConfigError::InvalidValue` if validation fails.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise the
    /// errors of [`LedgerConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The cache TTL is zero
    /// - A codec limit is zero
    /// - Pruning is enabled with a zero interval
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_cache.ttl == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidValue(
                "client_cache.ttl must be > 0".to_string(),
            ));
        }

        if self.codec.max_depth == 0 {
            return Err(ConfigError::InvalidValue(
                "codec.max_depth must be > 0".to_string(),
            ));
        }

        if self.codec.max_payload_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "codec.max_payload_bytes must be > 0".to_string(),
            ));
        }

        if self.pruning.enabled && self.pruning.interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "pruning.interval must be > 0 when pruning is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.client_cache.enabled);
        assert!(config.lookup.include_state_in_untyped_lookup);
        assert!(!config.pruning.enabled);
        assert_eq!(config.codec.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = LedgerConfig::from_toml_str("").unwrap();
        assert_eq!(config, LedgerConfig::default());
    }

    #[test]
    fn test_parse_sections() {
        let config = LedgerConfig::from_toml_str(
            r#"
            [client_cache]
            ttl = "30s"

            [codec]
            max_depth = 8

            [lookup]
            include_state_in_untyped_lookup = false

            [pruning]
            enabled = true
            interval = "1h"
            "#,
        )
        .unwrap();

        assert_eq!(config.client_cache.ttl, Some(Duration::from_secs(30)));
        assert_eq!(config.codec.max_depth, 8);
        assert_eq!(config.codec.max_payload_bytes, DEFAULT_MAX_PAYLOAD_BYTES);
        assert!(!config.lookup.include_state_in_untyped_lookup);
        assert!(config.pruning.enabled);
        assert_eq!(config.pruning.interval, Duration::from_secs(3600));
    }

    #[test]
    fn test_zero_depth_is_rejected() {
        let err = LedgerConfig::from_toml_str("[codec]\nmax_depth = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_zero_interval_with_pruning_is_rejected() {
        let mut config = LedgerConfig::default();
        config.pruning.enabled = true;
        config.pruning.interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.pruning.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_toml() {
        let err = LedgerConfig::from_toml_str("[codec\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pruning]\nenabled = true\ninterval = \"5m\"").unwrap();

        let config = LedgerConfig::from_file(file.path()).unwrap();
        assert!(config.pruning.enabled);
        assert_eq!(config.pruning.interval, Duration::from_secs(300));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LedgerConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
