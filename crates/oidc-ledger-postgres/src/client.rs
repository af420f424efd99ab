//! Registered client storage over `oauth2_registered_client`.

use std::sync::Arc;

use async_trait::async_trait;
use oidc_ledger::storage::ClientDirectory;
use oidc_ledger::{
    ClientAuthMethod, ClientSettings, GrantType, LedgerError, LedgerResult, RegisteredClient,
    TokenSettings,
};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::PgRow;
use tracing::{debug, instrument};

use crate::{PgPool, StorageError, StorageResult, map_unique_violation};

fn to_vec<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    values.into_iter().map(str::to_string).collect()
}

fn client_from_row(row: &PgRow) -> StorageResult<RegisteredClient> {
    let methods: Vec<String> = row.try_get("client_authentication_methods")?;
    let grant_types: Vec<String> = row.try_get("authorization_grant_types")?;
    let redirect_uris: Vec<String> = row.try_get("redirect_uris")?;
    let post_logout_redirect_uris: Vec<String> = row.try_get("post_logout_redirect_uris")?;
    let scopes: Vec<String> = row.try_get("scopes")?;
    let client_settings: serde_json::Value = row.try_get("client_settings")?;
    let token_settings: serde_json::Value = row.try_get("token_settings")?;

    Ok(RegisteredClient {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        client_id_issued_at: row.try_get("client_id_issued_at")?,
        client_secret: row.try_get("client_secret")?,
        client_secret_expires_at: row.try_get("client_secret_expires_at")?,
        client_name: row.try_get("client_name")?,
        authentication_methods: methods.into_iter().map(ClientAuthMethod::from).collect(),
        grant_types: grant_types.into_iter().map(GrantType::from).collect(),
        redirect_uris: redirect_uris.into_iter().collect(),
        post_logout_redirect_uris: post_logout_redirect_uris.into_iter().collect(),
        scopes: scopes.into_iter().collect(),
        client_settings: serde_json::from_value::<ClientSettings>(client_settings)?,
        token_settings: serde_json::from_value::<TokenSettings>(token_settings)?,
    })
}

/// Low-level client queries against a borrowed pool.
pub struct ClientStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> ClientStorage<'a> {
    /// Creates a new client storage with the given pool.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Finds a client by its internal id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored settings are invalid.
    pub async fn find_by_id(&self, id: &str) -> StorageResult<Option<RegisteredClient>> {
        let row = query("SELECT * FROM oauth2_registered_client WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(client_from_row).transpose()
    }

    /// Finds a client by its public `client_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored settings are invalid.
    pub async fn find_by_client_id(&self, client_id: &str) -> StorageResult<Option<RegisteredClient>> {
        let row = query("SELECT * FROM oauth2_registered_client WHERE client_id = $1")
            .bind(client_id)
            .fetch_optional(self.pool)
            .await?;
        row.as_ref().map(client_from_row).transpose()
    }

    /// Inserts or replaces a client.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if another client holds the same
    /// `client_id`.
    #[instrument(skip(self, client), fields(client_id = %client.client_id))]
    pub async fn save(&self, client: &RegisteredClient) -> StorageResult<()> {
        let client_settings = serde_json::to_value(&client.client_settings)?;
        let token_settings = serde_json::to_value(&client.token_settings)?;

        query(
            r#"
            INSERT INTO oauth2_registered_client (
                id, client_id, client_id_issued_at, client_secret, client_secret_expires_at,
                client_name, client_authentication_methods, authorization_grant_types,
                redirect_uris, post_logout_redirect_uris, scopes,
                client_settings, token_settings
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                client_id = EXCLUDED.client_id,
                client_id_issued_at = EXCLUDED.client_id_issued_at,
                client_secret = EXCLUDED.client_secret,
                client_secret_expires_at = EXCLUDED.client_secret_expires_at,
                client_name = EXCLUDED.client_name,
                client_authentication_methods = EXCLUDED.client_authentication_methods,
                authorization_grant_types = EXCLUDED.authorization_grant_types,
                redirect_uris = EXCLUDED.redirect_uris,
                post_logout_redirect_uris = EXCLUDED.post_logout_redirect_uris,
                scopes = EXCLUDED.scopes,
                client_settings = EXCLUDED.client_settings,
                token_settings = EXCLUDED.token_settings
            "#,
        )
        .bind(&client.id)
        .bind(&client.client_id)
        .bind(client.client_id_issued_at)
        .bind(client.client_secret.as_deref())
        .bind(client.client_secret_expires_at)
        .bind(&client.client_name)
        .bind(to_vec(client.authentication_methods.iter().map(ClientAuthMethod::as_str)))
        .bind(to_vec(client.grant_types.iter().map(GrantType::as_str)))
        .bind(to_vec(client.redirect_uris.iter().map(String::as_str)))
        .bind(to_vec(client.post_logout_redirect_uris.iter().map(String::as_str)))
        .bind(to_vec(client.scopes.iter().map(String::as_str)))
        .bind(client_settings)
        .bind(token_settings)
        .execute(self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, || {
                StorageError::conflict(format!(
                    "client_id '{}' is already registered",
                    client.client_id
                ))
            })
        })?;

        debug!("Registered client saved");
        Ok(())
    }
}

/// [`ClientDirectory`] over a shared pool.
#[derive(Debug, Clone)]
pub struct PostgresClientDirectory {
    pool: Arc<PgPool>,
}

impl PostgresClientDirectory {
    /// Creates a new client directory with the given pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    fn storage(&self) -> ClientStorage<'_> {
        ClientStorage::new(&self.pool)
    }
}

#[async_trait]
impl ClientDirectory for PostgresClientDirectory {
    async fn find_by_id(&self, id: &str) -> LedgerResult<Option<Arc<RegisteredClient>>> {
        let client = self.storage().find_by_id(id).await?;
        Ok(client.map(Arc::new))
    }

    async fn find_by_client_id(
        &self,
        client_id: &str,
    ) -> LedgerResult<Option<Arc<RegisteredClient>>> {
        let client = self.storage().find_by_client_id(client_id).await?;
        Ok(client.map(Arc::new))
    }

    async fn save(&self, client: &RegisteredClient) -> LedgerResult<()> {
        client.validate()?;
        self.storage().save(client).await.map_err(LedgerError::from)
    }
}
