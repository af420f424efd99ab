//! PostgreSQL storage backend for the OIDC authorization ledger.
//!
//! This crate implements the `GrantStore`, `ClientDirectory` and
//! `ConsentStore` traits from `oidc-ledger` on top of four tables:
//!
//! - `oauth2_registered_client` - registered clients
//! - `oauth2_authorization` - one flattened row per grant
//! - `oauth2_authorization_token` - the global token index, one row per
//!   artifact value (and `state`), keyed by value
//! - `oauth2_authorization_consent` - consent records
//!
//! The token index table is what enforces value uniqueness across grants:
//! its primary key makes a conflicting upsert fail inside the same
//! transaction that writes the grant row, so nothing is persisted.
//!
//! # Example
//!
//! ```ignore
//! use oidc_ledger::LedgerConfig;
//! use oidc_ledger_postgres::{PostgresConfig, PostgresLedgerStorage};
//!
//! let config = PostgresConfig::new("postgres://localhost/oidc");
//! let storage = PostgresLedgerStorage::from_config(&config).await?;
//! let ledger = storage.authorization_ledger(&LedgerConfig::default())?;
//! ```

mod client;
mod config;
mod consent;
mod grant;
pub mod migrations;
mod pool;

use std::sync::Arc;

use oidc_ledger::codec::DecodeError;
use oidc_ledger::{
    AuthorizationLedger, ConsentLedger, LedgerConfig, LedgerError, LedgerResult,
};
use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;
use thiserror::Error;
use tracing::info;

pub use client::{ClientStorage, PostgresClientDirectory};
pub use config::PostgresConfig;
pub use consent::{ConsentStorage, PostgresConsentStore};
pub use grant::{GrantStorage, PostgresGrantStore};
pub use pool::{connect_options, create_pool, mask_password};

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

/// Storage error type for PostgreSQL operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// A token index value already belongs to another grant.
    #[error("Duplicate token: {0}")]
    DuplicateToken(String),

    /// Conflict with existing data.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored row could not be read back.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl StorageError {
    /// Creates a duplicate token error for the given kind.
    #[must_use]
    pub fn duplicate_token(kind: impl Into<String>) -> Self {
        Self::DuplicateToken(kind.into())
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Creates a corrupt row error.
    #[must_use]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }

    /// Creates a migration error.
    #[must_use]
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into())
    }

    /// Returns `true` if this is a duplicate token error.
    #[must_use]
    pub fn is_duplicate_token(&self) -> bool {
        matches!(self, Self::DuplicateToken(_))
    }

    /// Returns `true` if this is a conflict error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if this is a client error (4xx equivalent).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::DuplicateToken(_) | Self::Conflict(_))
    }

    /// Returns `true` if this is a server error (5xx equivalent).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}

impl From<StorageError> for LedgerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateToken(kind) => LedgerError::duplicate_token(kind),
            StorageError::Conflict(message) => LedgerError::invalid_client(message),
            StorageError::Corrupt(column) => LedgerError::Decode(DecodeError::MissingField(column)),
            StorageError::Serialization(e) => LedgerError::Decode(DecodeError::Malformed(e)),
            StorageError::Database(e) => LedgerError::store_unavailable(e.to_string()),
            StorageError::Migration(message) => LedgerError::store_unavailable(message),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Maps a unique violation to `on_conflict`, passing other errors through.
pub(crate) fn map_unique_violation(
    err: sqlx_core::Error,
    on_conflict: impl FnOnce() -> StorageError,
) -> StorageError {
    if let sqlx_core::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return on_conflict();
    }
    StorageError::from(err)
}

/// PostgreSQL-backed ledger storage.
///
/// Owns the connection pool and hands out the three store adapters. Every
/// adapter shares the same pool.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStorage {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStorage {
    /// Creates a new storage instance from an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Creates a new storage instance from a shared pool.
    #[must_use]
    pub fn from_pool_arc(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Creates the pool described by `config` and migrates the schema, or
    /// only verifies it when migrations are disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails, a migration fails or the
    /// schema is incomplete.
    pub async fn from_config(config: &PostgresConfig) -> StorageResult<Self> {
        let pool = create_pool(config).await?;
        let storage = Self::new(pool);
        if config.run_migrations {
            storage.run_migrations().await?;
        } else {
            migrations::verify(&storage.pool).await?;
        }
        info!(url = %mask_password(&config.url), "Ledger storage ready");
        Ok(storage)
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn run_migrations(&self) -> StorageResult<()> {
        migrations::run(&self.pool).await
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Returns the shared connection pool.
    #[must_use]
    pub fn pool_arc(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Returns a grant store over this pool.
    #[must_use]
    pub fn grants(&self) -> PostgresGrantStore {
        PostgresGrantStore::new(self.pool.clone())
    }

    /// Returns a client directory over this pool.
    #[must_use]
    pub fn clients(&self) -> PostgresClientDirectory {
        PostgresClientDirectory::new(self.pool.clone())
    }

    /// Returns a consent store over this pool.
    #[must_use]
    pub fn consents(&self) -> PostgresConsentStore {
        PostgresConsentStore::new(self.pool.clone())
    }

    /// Creates an authorization ledger over these tables.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if `config` does not validate.
    pub fn authorization_ledger(
        &self,
        config: &LedgerConfig,
    ) -> LedgerResult<AuthorizationLedger> {
        AuthorizationLedger::from_config(
            Arc::new(self.grants()),
            Arc::new(self.clients()),
            config,
        )
    }

    /// Creates a consent ledger over these tables.
    #[must_use]
    pub fn consent_ledger(&self) -> ConsentLedger {
        ConsentLedger::new(Arc::new(self.consents()), Arc::new(self.clients()))
    }
}
