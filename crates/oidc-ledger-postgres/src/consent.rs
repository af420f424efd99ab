//! Consent storage over `oauth2_authorization_consent`.

use std::sync::Arc;

use async_trait::async_trait;
use oidc_ledger::storage::ConsentStore;
use oidc_ledger::{ConsentRecord, LedgerError, LedgerResult};
use sqlx_core::query_as::query_as;
use sqlx_core::query::query;
use tracing::instrument;

use crate::{PgPool, StorageResult};

/// Low-level consent queries against a borrowed pool.
pub struct ConsentStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> ConsentStorage<'a> {
    /// Creates a new consent storage with the given pool.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces a consent record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    #[instrument(skip(self, record), fields(client_id = %record.client_id))]
    pub async fn save(&self, record: &ConsentRecord) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO oauth2_authorization_consent (client_id, principal_name, authorities)
            VALUES ($1, $2, $3)
            ON CONFLICT (client_id, principal_name)
            DO UPDATE SET authorities = EXCLUDED.authorities
            "#,
        )
        .bind(&record.client_id)
        .bind(&record.principal_name)
        .bind(record.authorities.iter().cloned().collect::<Vec<String>>())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Deletes a consent record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn remove(&self, client_id: &str, principal_name: &str) -> StorageResult<bool> {
        let result = query(
            "DELETE FROM oauth2_authorization_consent WHERE client_id = $1 AND principal_name = $2",
        )
        .bind(client_id)
        .bind(principal_name)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Finds the consent a principal gave a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_id(
        &self,
        client_id: &str,
        principal_name: &str,
    ) -> StorageResult<Option<ConsentRecord>> {
        let row: Option<(Vec<String>,)> = query_as(
            r#"
            SELECT authorities FROM oauth2_authorization_consent
            WHERE client_id = $1 AND principal_name = $2
            "#,
        )
        .bind(client_id)
        .bind(principal_name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(authorities,)| ConsentRecord {
            client_id: client_id.to_string(),
            principal_name: principal_name.to_string(),
            authorities: authorities.into_iter().collect(),
        }))
    }
}

/// [`ConsentStore`] over a shared pool.
#[derive(Debug, Clone)]
pub struct PostgresConsentStore {
    pool: Arc<PgPool>,
}

impl PostgresConsentStore {
    /// Creates a new consent store with the given pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    fn storage(&self) -> ConsentStorage<'_> {
        ConsentStorage::new(&self.pool)
    }
}

#[async_trait]
impl ConsentStore for PostgresConsentStore {
    async fn save(&self, record: &ConsentRecord) -> LedgerResult<()> {
        self.storage().save(record).await.map_err(LedgerError::from)
    }

    async fn remove(&self, client_id: &str, principal_name: &str) -> LedgerResult<bool> {
        self.storage()
            .remove(client_id, principal_name)
            .await
            .map_err(LedgerError::from)
    }

    async fn find_by_id(
        &self,
        client_id: &str,
        principal_name: &str,
    ) -> LedgerResult<Option<ConsentRecord>> {
        self.storage()
            .find_by_id(client_id, principal_name)
            .await
            .map_err(LedgerError::from)
    }
}
