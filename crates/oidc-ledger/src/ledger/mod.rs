//! Ledger services.
//!
//! [`AuthorizationLedger`] owns grant persistence: it validates grants,
//! encodes their metadata with the [`TokenCodec`], writes them through a
//! [`GrantStore`] and materializes them again against the registered client
//! directory. [`ConsentLedger`] does the same for consent records.
//!
//! Neither service holds locks of its own. Per-row atomicity is the
//! backend's responsibility.

mod consent;
mod row;

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, error, info, instrument};

use crate::LedgerResult;
use crate::cache::CachedClientDirectory;
use crate::codec::TokenCodec;
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::storage::{ClientDirectory, GrantRow, GrantStore};
use crate::types::{AuthorizationGrant, TokenKind};

pub use consent::ConsentLedger;

/// Kinds searched by an untyped lookup when `state` is excluded.
const UNTYPED_ARTIFACTS: &[TokenKind] = &TokenKind::ARTIFACTS;

/// Kinds searched by an untyped lookup when `state` is included.
const UNTYPED_WITH_STATE: &[TokenKind] = &TokenKind::ALL;

/// Persistence and lookup service for authorization grants.
///
/// Cheap to share: wrap it in an `Arc` and hand it to every request task.
pub struct AuthorizationLedger {
    grants: Arc<dyn GrantStore>,
    clients: Arc<dyn ClientDirectory>,
    codec: TokenCodec,
    include_state_in_untyped_lookup: bool,
}

impl AuthorizationLedger {
    /// Creates a ledger with the default codec and lookup behaviour.
    pub fn new(grants: Arc<dyn GrantStore>, clients: Arc<dyn ClientDirectory>) -> Self {
        Self {
            grants,
            clients,
            codec: TokenCodec::default(),
            include_state_in_untyped_lookup: true,
        }
    }

    /// Creates a ledger from configuration.
    ///
    /// When the client cache is enabled, `clients` is wrapped in a
    /// [`CachedClientDirectory`].
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if `config` does not validate.
    pub fn from_config(
        grants: Arc<dyn GrantStore>,
        clients: Arc<dyn ClientDirectory>,
        config: &LedgerConfig,
    ) -> LedgerResult<Self> {
        config.validate()?;

        let clients: Arc<dyn ClientDirectory> = if config.client_cache.enabled {
            Arc::new(CachedClientDirectory::new(clients, config.client_cache.ttl))
        } else {
            clients
        };

        Ok(Self {
            grants,
            clients,
            codec: TokenCodec::from_config(&config.codec),
            include_state_in_untyped_lookup: config.lookup.include_state_in_untyped_lookup,
        })
    }

    /// Replaces the codec.
    #[must_use]
    pub fn with_codec(mut self, codec: TokenCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Sets whether an untyped lookup also matches `state` values.
    #[must_use]
    pub fn with_untyped_state_lookup(mut self, include: bool) -> Self {
        self.include_state_in_untyped_lookup = include;
        self
    }

    /// Returns the codec used for stored metadata.
    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Returns the registered client directory.
    #[must_use]
    pub fn clients(&self) -> &Arc<dyn ClientDirectory> {
        &self.clients
    }

    /// Inserts the grant or replaces the stored grant with the same id.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidGrant` if [`AuthorizationGrant::validate`] fails
    /// - `LedgerError::RegisteredClientMissing` if the client is unknown
    /// - `LedgerError::Encode` if metadata cannot be stored
    /// - `LedgerError::DuplicateToken` if a value belongs to another grant
    /// - `LedgerError::StoreUnavailable` if the store fails
    #[instrument(skip(self, grant), fields(grant_id = %grant.id, client_id = %grant.client_id))]
    pub async fn save(&self, grant: &AuthorizationGrant) -> LedgerResult<()> {
        grant.validate()?;

        if self.clients.find_by_id(&grant.client_id).await?.is_none() {
            return Err(LedgerError::registered_client_missing(&grant.client_id));
        }

        let row = row::encode_grant(&self.codec, grant)?;
        self.grants.upsert(&row).await?;

        debug!(
            grant_type = %grant.grant_type,
            artifacts = row.token_index().len(),
            "Saved authorization grant"
        );
        Ok(())
    }

    /// Deletes the grant and all of its artifact values.
    ///
    /// Returns `true` if the grant existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn remove(&self, grant: &AuthorizationGrant) -> LedgerResult<bool> {
        self.remove_by_id(&grant.id).await
    }

    /// Deletes the grant with the given id.
    ///
    /// Returns `true` if the grant existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    #[instrument(skip(self))]
    pub async fn remove_by_id(&self, id: &str) -> LedgerResult<bool> {
        let removed = self.grants.delete(id).await?;
        if removed {
            debug!(grant_id = %id, "Removed authorization grant");
        }
        Ok(removed)
    }

    /// Finds a grant by id.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Decode` if stored metadata is malformed or disallowed
    /// - `LedgerError::RegisteredClientMissing` if the client is gone
    /// - `LedgerError::StoreUnavailable` if the store fails
    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: &str) -> LedgerResult<Option<AuthorizationGrant>> {
        match self.grants.find_by_id(id).await? {
            Some(row) => self.materialize(row).await.map(Some),
            None => Ok(None),
        }
    }

    /// Finds the grant owning `value`.
    ///
    /// With a `kind`, only that slot is searched. Without one, every artifact
    /// slot is searched, plus `state` unless untyped state lookup is disabled.
    /// Expired artifacts are returned.
    ///
    /// # Errors
    ///
    /// Same as [`AuthorizationLedger::find_by_id`].
    #[instrument(skip(self, value))]
    pub async fn find_by_token(
        &self,
        value: &str,
        kind: Option<TokenKind>,
    ) -> LedgerResult<Option<AuthorizationGrant>> {
        let single;
        let kinds: &[TokenKind] = match kind {
            Some(kind) => {
                single = [kind];
                &single
            }
            None if self.include_state_in_untyped_lookup => UNTYPED_WITH_STATE,
            None => UNTYPED_ARTIFACTS,
        };

        match self.grants.find_by_token(value, kinds).await? {
            Some(row) => self.materialize(row).await.map(Some),
            None => Ok(None),
        }
    }

    /// Finds the grant created with the given `state`.
    ///
    /// # Errors
    ///
    /// Same as [`AuthorizationLedger::find_by_id`].
    pub async fn find_by_state(&self, state: &str) -> LedgerResult<Option<AuthorizationGrant>> {
        self.find_by_token(state, Some(TokenKind::State)).await
    }

    /// Deletes every grant whose populated artifacts have all expired at `now`.
    ///
    /// Returns the number of deleted grants.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    #[instrument(skip(self))]
    pub async fn remove_expired(&self, now: OffsetDateTime) -> LedgerResult<u64> {
        let removed = self.grants.delete_expired(now).await?;
        if removed > 0 {
            info!(removed, "Removed expired authorization grants");
        }
        Ok(removed)
    }

    async fn materialize(&self, row: GrantRow) -> LedgerResult<AuthorizationGrant> {
        let grant_id = row.id.clone();
        let grant = row::decode_grant(&self.codec, row).inspect_err(|e| {
            error!(grant_id = %grant_id, error = %e, "Failed to decode stored grant");
        })?;

        if self.clients.find_by_id(&grant.client_id).await?.is_none() {
            error!(
                grant_id = %grant.id,
                client_id = %grant.client_id,
                "Stored grant references a missing registered client"
            );
            return Err(LedgerError::registered_client_missing(&grant.client_id));
        }

        Ok(grant)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Minimal stores for unit tests of the ledger services.

    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use time::OffsetDateTime;
    use tokio::sync::Mutex;

    use crate::LedgerResult;
    use crate::error::LedgerError;
    use crate::storage::{ClientDirectory, ConsentStore, GrantRow, GrantStore};
    use crate::types::{ConsentRecord, RegisteredClient, TokenKind};

    #[derive(Default)]
    pub struct FakeGrants {
        pub rows: Mutex<HashMap<String, GrantRow>>,
    }

    #[async_trait]
    impl GrantStore for FakeGrants {
        async fn upsert(&self, row: &GrantRow) -> LedgerResult<()> {
            let mut rows = self.rows.lock().await;
            for other in rows.values().filter(|other| other.id != row.id) {
                for (kind, value) in row.token_index() {
                    if other.token_index().iter().any(|(_, v)| *v == value) {
                        return Err(LedgerError::duplicate_token(kind.as_str()));
                    }
                }
            }
            rows.insert(row.id.clone(), row.clone());
            Ok(())
        }

        async fn delete(&self, id: &str) -> LedgerResult<bool> {
            Ok(self.rows.lock().await.remove(id).is_some())
        }

        async fn find_by_id(&self, id: &str) -> LedgerResult<Option<GrantRow>> {
            Ok(self.rows.lock().await.get(id).cloned())
        }

        async fn find_by_token(
            &self,
            value: &str,
            kinds: &[TokenKind],
        ) -> LedgerResult<Option<GrantRow>> {
            let rows = self.rows.lock().await;
            Ok(rows
                .values()
                .find(|row| kinds.iter().any(|kind| row.value_of(*kind) == Some(value)))
                .cloned())
        }

        async fn delete_expired(&self, now: OffsetDateTime) -> LedgerResult<u64> {
            let mut rows = self.rows.lock().await;
            let before = rows.len();
            rows.retain(|_, row| !row.is_expired_at(now));
            Ok((before - rows.len()) as u64)
        }
    }

    #[derive(Default)]
    pub struct FakeClients {
        pub clients: Mutex<HashMap<String, Arc<RegisteredClient>>>,
        pub lookups: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl ClientDirectory for FakeClients {
        async fn find_by_id(&self, id: &str) -> LedgerResult<Option<Arc<RegisteredClient>>> {
            self.lookups
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(self.clients.lock().await.get(id).cloned())
        }

        async fn find_by_client_id(
            &self,
            client_id: &str,
        ) -> LedgerResult<Option<Arc<RegisteredClient>>> {
            self.lookups
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(self
                .clients
                .lock()
                .await
                .values()
                .find(|c| c.client_id == client_id)
                .cloned())
        }

        async fn save(&self, client: &RegisteredClient) -> LedgerResult<()> {
            client.validate()?;
            self.clients
                .lock()
                .await
                .insert(client.id.clone(), Arc::new(client.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct FakeConsents {
        pub records: Mutex<HashMap<(String, String), ConsentRecord>>,
    }

    #[async_trait]
    impl ConsentStore for FakeConsents {
        async fn save(&self, record: &ConsentRecord) -> LedgerResult<()> {
            self.records.lock().await.insert(
                (record.client_id.clone(), record.principal_name.clone()),
                record.clone(),
            );
            Ok(())
        }

        async fn remove(&self, client_id: &str, principal_name: &str) -> LedgerResult<bool> {
            Ok(self
                .records
                .lock()
                .await
                .remove(&(client_id.to_string(), principal_name.to_string()))
                .is_some())
        }

        async fn find_by_id(
            &self,
            client_id: &str,
            principal_name: &str,
        ) -> LedgerResult<Option<ConsentRecord>> {
            Ok(self
                .records
                .lock()
                .await
                .get(&(client_id.to_string(), principal_name.to_string()))
                .cloned())
        }
    }
}
