//! Grant storage over `oauth2_authorization` and its token index.
//!
//! An upsert writes the grant row and rebuilds its rows in
//! `oauth2_authorization_token` inside one transaction. The grant row is
//! written first, so concurrent saves of the same id serialize on its row
//! lock. A value already indexed for another grant violates the index
//! primary key and rolls the whole transaction back.

use std::sync::Arc;

use async_trait::async_trait;
use oidc_ledger::storage::{ArtifactRow, GrantRow, GrantStore};
use oidc_ledger::{LedgerError, LedgerResult, TokenKind};
use sqlx_core::query::{Query, query};
use sqlx_core::row::Row;
use sqlx_postgres::{PgArguments, PgRow, Postgres};
use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::{PgPool, StorageError, StorageResult, map_unique_violation};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

const UPSERT_GRANT: &str = r#"
    INSERT INTO oauth2_authorization (
        id, client_id, principal_name, grant_type, scopes, attributes, state,
        code_value, code_issued_at, code_expires_at, code_metadata,
        access_value, access_issued_at, access_expires_at, access_metadata,
        access_type, access_scopes,
        refresh_value, refresh_issued_at, refresh_expires_at, refresh_metadata,
        id_token_value, id_token_issued_at, id_token_expires_at, id_token_metadata,
        id_token_claims,
        user_code_value, user_code_issued_at, user_code_expires_at, user_code_metadata,
        device_code_value, device_code_issued_at, device_code_expires_at, device_code_metadata
    )
    VALUES (
        $1, $2, $3, $4, $5, $6, $7,
        $8, $9, $10, $11,
        $12, $13, $14, $15,
        $16, $17,
        $18, $19, $20, $21,
        $22, $23, $24, $25,
        $26,
        $27, $28, $29, $30,
        $31, $32, $33, $34
    )
    ON CONFLICT (id) DO UPDATE SET
        client_id = EXCLUDED.client_id,
        principal_name = EXCLUDED.principal_name,
        grant_type = EXCLUDED.grant_type,
        scopes = EXCLUDED.scopes,
        attributes = EXCLUDED.attributes,
        state = EXCLUDED.state,
        code_value = EXCLUDED.code_value,
        code_issued_at = EXCLUDED.code_issued_at,
        code_expires_at = EXCLUDED.code_expires_at,
        code_metadata = EXCLUDED.code_metadata,
        access_value = EXCLUDED.access_value,
        access_issued_at = EXCLUDED.access_issued_at,
        access_expires_at = EXCLUDED.access_expires_at,
        access_metadata = EXCLUDED.access_metadata,
        access_type = EXCLUDED.access_type,
        access_scopes = EXCLUDED.access_scopes,
        refresh_value = EXCLUDED.refresh_value,
        refresh_issued_at = EXCLUDED.refresh_issued_at,
        refresh_expires_at = EXCLUDED.refresh_expires_at,
        refresh_metadata = EXCLUDED.refresh_metadata,
        id_token_value = EXCLUDED.id_token_value,
        id_token_issued_at = EXCLUDED.id_token_issued_at,
        id_token_expires_at = EXCLUDED.id_token_expires_at,
        id_token_metadata = EXCLUDED.id_token_metadata,
        id_token_claims = EXCLUDED.id_token_claims,
        user_code_value = EXCLUDED.user_code_value,
        user_code_issued_at = EXCLUDED.user_code_issued_at,
        user_code_expires_at = EXCLUDED.user_code_expires_at,
        user_code_metadata = EXCLUDED.user_code_metadata,
        device_code_value = EXCLUDED.device_code_value,
        device_code_issued_at = EXCLUDED.device_code_issued_at,
        device_code_expires_at = EXCLUDED.device_code_expires_at,
        device_code_metadata = EXCLUDED.device_code_metadata
"#;

// A grant qualifies when it holds at least one artifact and every populated
// artifact has an expiry in the past. A NULL expiry never compares true.
const DELETE_EXPIRED: &str = r#"
    DELETE FROM oauth2_authorization
    WHERE num_nonnulls(
            code_value, access_value, refresh_value,
            id_token_value, user_code_value, device_code_value
        ) > 0
      AND (code_value IS NULL OR code_expires_at < $1)
      AND (access_value IS NULL OR access_expires_at < $1)
      AND (refresh_value IS NULL OR refresh_expires_at < $1)
      AND (id_token_value IS NULL OR id_token_expires_at < $1)
      AND (user_code_value IS NULL OR user_code_expires_at < $1)
      AND (device_code_value IS NULL OR device_code_expires_at < $1)
"#;

fn bind_artifact<'q>(query: PgQuery<'q>, artifact: Option<&'q ArtifactRow>) -> PgQuery<'q> {
    query
        .bind(artifact.map(|a| a.value.as_str()))
        .bind(artifact.map(|a| a.issued_at))
        .bind(artifact.and_then(|a| a.expires_at))
        .bind(artifact.and_then(|a| a.metadata.as_deref()))
}

fn artifact_from_row(row: &PgRow, prefix: &str) -> StorageResult<Option<ArtifactRow>> {
    let value: Option<String> = row.try_get(format!("{prefix}_value").as_str())?;
    let Some(value) = value else {
        return Ok(None);
    };

    let issued_column = format!("{prefix}_issued_at");
    let issued_at: Option<OffsetDateTime> = row.try_get(issued_column.as_str())?;
    let issued_at = issued_at.ok_or_else(|| StorageError::corrupt(issued_column))?;

    Ok(Some(ArtifactRow {
        value,
        issued_at,
        expires_at: row.try_get(format!("{prefix}_expires_at").as_str())?,
        metadata: row.try_get(format!("{prefix}_metadata").as_str())?,
    }))
}

fn grant_from_row(row: &PgRow) -> StorageResult<GrantRow> {
    Ok(GrantRow {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        principal_name: row.try_get("principal_name")?,
        grant_type: row.try_get("grant_type")?,
        scopes: row.try_get("scopes")?,
        attributes: row.try_get("attributes")?,
        state: row.try_get("state")?,
        code: artifact_from_row(row, "code")?,
        access_token: artifact_from_row(row, "access")?,
        access_token_type: row.try_get("access_type")?,
        access_token_scopes: row.try_get("access_scopes")?,
        refresh_token: artifact_from_row(row, "refresh")?,
        id_token: artifact_from_row(row, "id_token")?,
        id_token_claims: row.try_get("id_token_claims")?,
        user_code: artifact_from_row(row, "user_code")?,
        device_code: artifact_from_row(row, "device_code")?,
    })
}

/// Low-level grant queries against a borrowed pool.
pub struct GrantStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> GrantStorage<'a> {
    /// Creates a new grant storage with the given pool.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Writes the row and replaces its token index in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::DuplicateToken` if an indexed value belongs to
    /// another grant. Nothing is written in that case.
    #[instrument(skip(self, row), fields(grant_id = %row.id))]
    pub async fn upsert(&self, row: &GrantRow) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        let statement = query(UPSERT_GRANT)
            .bind(&row.id)
            .bind(&row.client_id)
            .bind(&row.principal_name)
            .bind(&row.grant_type)
            .bind(&row.scopes)
            .bind(row.attributes.as_deref())
            .bind(row.state.as_deref());
        let statement = bind_artifact(statement, row.code.as_ref());
        let statement = bind_artifact(statement, row.access_token.as_ref())
            .bind(row.access_token_type.as_deref())
            .bind(row.access_token_scopes.as_deref());
        let statement = bind_artifact(statement, row.refresh_token.as_ref());
        let statement = bind_artifact(statement, row.id_token.as_ref())
            .bind(row.id_token_claims.as_deref());
        let statement = bind_artifact(statement, row.user_code.as_ref());
        let statement = bind_artifact(statement, row.device_code.as_ref());
        statement.execute(&mut *tx).await?;

        query("DELETE FROM oauth2_authorization_token WHERE grant_id = $1")
            .bind(&row.id)
            .execute(&mut *tx)
            .await?;

        for (kind, value) in row.token_index() {
            query("INSERT INTO oauth2_authorization_token (value, grant_id, kind) VALUES ($1, $2, $3)")
                .bind(value)
                .bind(&row.id)
                .bind(kind.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_unique_violation(e, || StorageError::duplicate_token(kind.as_str())))?;
        }

        tx.commit().await?;
        debug!("Grant saved");
        Ok(())
    }

    /// Deletes a grant; its index rows go with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> StorageResult<bool> {
        let result = query("DELETE FROM oauth2_authorization WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Finds a grant row by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is corrupt.
    pub async fn find_by_id(&self, id: &str) -> StorageResult<Option<GrantRow>> {
        let row = query("SELECT * FROM oauth2_authorization WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(grant_from_row).transpose()
    }

    /// Finds the grant holding `value` under one of `kinds`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is corrupt.
    pub async fn find_by_token(
        &self,
        value: &str,
        kinds: &[TokenKind],
    ) -> StorageResult<Option<GrantRow>> {
        let kinds: Vec<&str> = kinds.iter().map(TokenKind::as_str).collect();
        let row = query(
            r#"
            SELECT a.*
            FROM oauth2_authorization_token t
            JOIN oauth2_authorization a ON a.id = t.grant_id
            WHERE t.value = $1 AND t.kind = ANY($2)
            "#,
        )
        .bind(value)
        .bind(kinds)
        .fetch_optional(self.pool)
        .await?;
        row.as_ref().map(grant_from_row).transpose()
    }

    /// Deletes every grant whose artifacts all expired before `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    #[instrument(skip(self))]
    pub async fn delete_expired(&self, now: OffsetDateTime) -> StorageResult<u64> {
        let result = query(DELETE_EXPIRED).bind(now).execute(self.pool).await?;
        let removed = result.rows_affected();
        if removed > 0 {
            debug!(removed, "Deleted expired grants");
        }
        Ok(removed)
    }
}

/// [`GrantStore`] over a shared pool.
#[derive(Debug, Clone)]
pub struct PostgresGrantStore {
    pool: Arc<PgPool>,
}

impl PostgresGrantStore {
    /// Creates a new grant store with the given pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    fn storage(&self) -> GrantStorage<'_> {
        GrantStorage::new(&self.pool)
    }
}

#[async_trait]
impl GrantStore for PostgresGrantStore {
    async fn upsert(&self, row: &GrantRow) -> LedgerResult<()> {
        self.storage().upsert(row).await.map_err(LedgerError::from)
    }

    async fn delete(&self, id: &str) -> LedgerResult<bool> {
        self.storage().delete(id).await.map_err(LedgerError::from)
    }

    async fn find_by_id(&self, id: &str) -> LedgerResult<Option<GrantRow>> {
        self.storage().find_by_id(id).await.map_err(LedgerError::from)
    }

    async fn find_by_token(
        &self,
        value: &str,
        kinds: &[TokenKind],
    ) -> LedgerResult<Option<GrantRow>> {
        self.storage()
            .find_by_token(value, kinds)
            .await
            .map_err(LedgerError::from)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> LedgerResult<u64> {
        self.storage()
            .delete_expired(now)
            .await
            .map_err(LedgerError::from)
    }
}
