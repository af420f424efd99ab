//! Configuration for the PostgreSQL ledger backend.

use serde::{Deserialize, Serialize};

/// PostgreSQL connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub url: String,

    /// Maximum number of pooled connections.
    pub pool_size: u32,

    /// Minimum number of idle connections. Defaults to a quarter of
    /// `pool_size`, at least one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_connections: Option<u32>,

    /// Timeout for acquiring a connection, in milliseconds.
    pub connect_timeout_ms: u64,

    /// Idle timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_ms: Option<u64>,

    /// Maximum connection lifetime in seconds. Defaults to 30 minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_lifetime_secs: Option<u64>,

    /// Apply the embedded migrations on startup. When disabled, startup
    /// only checks that the ledger tables exist.
    pub run_migrations: bool,

    /// `application_name` reported by every ledger connection.
    pub application_name: String,

    /// Server-side `statement_timeout` in milliseconds. `None` keeps the
    /// server default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_timeout_ms: Option<u64>,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/oidc_ledger".to_string(),
            pool_size: 10,
            min_connections: None,
            connect_timeout_ms: 5000,
            idle_timeout_ms: Some(300_000),
            max_lifetime_secs: None,
            run_migrations: true,
            application_name: "oidc-ledger".to_string(),
            statement_timeout_ms: None,
        }
    }
}

impl PostgresConfig {
    /// Creates a configuration for the given URL with default pool settings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    #[must_use]
    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = Some(min);
        self
    }

    #[must_use]
    pub fn with_connect_timeout_ms(mut self, timeout: u64) -> Self {
        self.connect_timeout_ms = timeout;
        self
    }

    #[must_use]
    pub fn with_idle_timeout_ms(mut self, timeout: Option<u64>) -> Self {
        self.idle_timeout_ms = timeout;
        self
    }

    #[must_use]
    pub fn with_run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    #[must_use]
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    #[must_use]
    pub fn with_statement_timeout_ms(mut self, timeout: Option<u64>) -> Self {
        self.statement_timeout_ms = timeout;
        self
    }
}
