//! Embedded schema migrations.
//!
//! Migrations are compiled into the binary and tracked in the
//! `_sqlx_migrations` table. To add one, create the SQL file under
//! `migrations/` and append it to `embedded_migrations!`.

use std::borrow::Cow;

use sqlx_core::migrate::{Migration, MigrationType, Migrator};
use tracing::{info, instrument};

use crate::{PgPool, StorageError, StorageResult};

/// Tables the ledger reads and writes.
pub const LEDGER_TABLES: [&str; 4] = [
    "oauth2_registered_client",
    "oauth2_authorization",
    "oauth2_authorization_token",
    "oauth2_authorization_consent",
];

macro_rules! embedded_migrations {
    () => {
        &[(
            20260101000001i64,
            "authorization_schema",
            include_str!("../migrations/20260101000001_authorization_schema.sql"),
        )]
    };
}

fn build_migrations() -> Vec<Migration> {
    embedded_migrations!()
        .iter()
        .map(|(version, description, sql)| Migration {
            version: *version,
            description: Cow::Borrowed(description),
            migration_type: MigrationType::Simple,
            sql: Cow::Borrowed(sql),
            checksum: Cow::Borrowed(&[]),
            no_tx: false,
        })
        .collect()
}

/// Applies every pending migration.
///
/// # Errors
///
/// Returns `StorageError::Migration` if a migration fails.
#[instrument(skip(pool))]
pub async fn run(pool: &PgPool) -> StorageResult<()> {
    let migrations = build_migrations();
    info!(count = migrations.len(), "Running ledger migrations");

    let migrator = Migrator {
        migrations: Cow::Owned(migrations),
        ignore_missing: false,
        locking: true,
        no_tx: false,
    };

    migrator
        .run(pool)
        .await
        .map_err(|e| StorageError::migration(format!("Failed to run migrations: {e}")))?;

    info!("Ledger migrations completed");
    Ok(())
}

/// Checks that every ledger table exists, for deployments that migrate the
/// schema out of band.
///
/// # Errors
///
/// Returns `StorageError::Migration` naming the missing tables.
#[instrument(skip(pool))]
pub async fn verify(pool: &PgPool) -> StorageResult<()> {
    let rows: Vec<(String,)> = sqlx_core::query_as::query_as(
        "SELECT table_name::text FROM information_schema.tables
         WHERE table_schema = current_schema()
         AND table_name::text = ANY($1)",
    )
    .bind(LEDGER_TABLES.map(str::to_string).to_vec())
    .fetch_all(pool)
    .await?;

    let missing: Vec<&str> = LEDGER_TABLES
        .into_iter()
        .filter(|table| !rows.iter().any(|(name,)| name == table))
        .collect();
    if !missing.is_empty() {
        return Err(StorageError::migration(format!(
            "Ledger schema is missing tables: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}
