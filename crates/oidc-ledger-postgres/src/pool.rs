//! Connection pool management.
//!
//! Every ledger connection reports its `application_name` and, when
//! configured, runs with a server-side `statement_timeout`.

use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::{PgConnectOptions, Postgres};
use tracing::{debug, info, instrument};

use crate::config::PostgresConfig;
use crate::{PgPool, StorageResult};

type PgPoolOptions = PoolOptions<Postgres>;

/// Builds the per-connection options for the ledger.
///
/// # Errors
///
/// Returns an error if the URL cannot be parsed.
pub fn connect_options(config: &PostgresConfig) -> StorageResult<PgConnectOptions> {
    let mut options = config
        .url
        .parse::<PgConnectOptions>()?
        .application_name(&config.application_name);

    if let Some(timeout) = config.statement_timeout_ms {
        options = options.options([("statement_timeout", timeout)]);
    }

    Ok(options)
}

/// Creates a connection pool from the given configuration.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the initial connections cannot
/// be established.
#[instrument(skip(config), fields(url = %mask_password(&config.url)))]
pub async fn create_pool(config: &PostgresConfig) -> StorageResult<PgPool> {
    info!(
        pool_size = config.pool_size,
        min_connections = ?config.min_connections,
        statement_timeout_ms = ?config.statement_timeout_ms,
        application_name = %config.application_name,
        "Creating ledger connection pool"
    );

    let connect_options = connect_options(config)?;

    let mut options = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .min_connections(min_connections(config))
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs.unwrap_or(1800)))
        .test_before_acquire(false);

    if let Some(idle_timeout) = config.idle_timeout_ms {
        options = options.idle_timeout(Duration::from_millis(idle_timeout));
    }

    let pool = options.connect_with(connect_options).await?;
    debug!("Ledger connection pool created");
    Ok(pool)
}

fn min_connections(config: &PostgresConfig) -> u32 {
    config
        .min_connections
        .unwrap_or(config.pool_size / 4)
        .clamp(1, config.pool_size.max(1))
}

/// Masks the password in a database URL for logging.
#[must_use]
pub fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@')
        && let Some(colon_pos) = url[..at_pos].rfind(':')
    {
        let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
        if colon_pos > scheme_end {
            return format!("{}:****{}", &url[..colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}
