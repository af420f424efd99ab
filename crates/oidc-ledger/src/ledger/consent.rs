//! Consent ledger.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::LedgerResult;
use crate::error::LedgerError;
use crate::storage::{ClientDirectory, ConsentStore};
use crate::types::ConsentRecord;

/// Records which scopes a principal approved for a client.
pub struct ConsentLedger {
    store: Arc<dyn ConsentStore>,
    clients: Arc<dyn ClientDirectory>,
}

impl ConsentLedger {
    /// Creates a consent ledger.
    pub fn new(store: Arc<dyn ConsentStore>, clients: Arc<dyn ClientDirectory>) -> Self {
        Self { store, clients }
    }

    /// Inserts or replaces the consent record.
    ///
    /// A record without authorities removes the stored consent instead.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::RegisteredClientMissing` if the client is
    /// unknown, or an error if the store fails.
    #[instrument(skip(self, record), fields(client_id = %record.client_id, principal = %record.principal_name))]
    pub async fn save(&self, record: &ConsentRecord) -> LedgerResult<()> {
        if record.client_id.is_empty() || record.principal_name.is_empty() {
            return Err(LedgerError::invalid_grant(
                "consent requires a client and a principal",
            ));
        }

        if self.clients.find_by_id(&record.client_id).await?.is_none() {
            return Err(LedgerError::registered_client_missing(&record.client_id));
        }

        if record.authorities.is_empty() {
            self.store
                .remove(&record.client_id, &record.principal_name)
                .await?;
            debug!("Removed consent without authorities");
            return Ok(());
        }

        self.store.save(record).await?;
        debug!(authorities = record.authorities.len(), "Saved consent");
        Ok(())
    }

    /// Removes the consent of a principal for a client.
    ///
    /// Returns `true` if a record existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    #[instrument(skip(self))]
    pub async fn remove(&self, client_id: &str, principal_name: &str) -> LedgerResult<bool> {
        self.store.remove(client_id, principal_name).await
    }

    /// Finds the consent of a principal for a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn find_by_id(
        &self,
        client_id: &str,
        principal_name: &str,
    ) -> LedgerResult<Option<ConsentRecord>> {
        self.store.find_by_id(client_id, principal_name).await
    }
}
