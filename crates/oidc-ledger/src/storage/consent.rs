//! Consent storage trait.
//!
//! # Implementation Notes
//!
//! Implementations should:
//!
//! - Key records by (`client_id`, `principal_name`)
//! - Support upsert for save operations

use async_trait::async_trait;

use crate::LedgerResult;
use crate::types::ConsentRecord;

/// Storage trait for consent records.
#[async_trait]
pub trait ConsentStore: Send + Sync {
    /// Inserts or replaces the record for its (client, principal) pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn save(&self, record: &ConsentRecord) -> LedgerResult<()>;

    /// Deletes the record for the (client, principal) pair.
    ///
    /// Returns `true` if a record was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn remove(&self, client_id: &str, principal_name: &str) -> LedgerResult<bool>;

    /// Finds the record for the (client, principal) pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(
        &self,
        client_id: &str,
        principal_name: &str,
    ) -> LedgerResult<Option<ConsentRecord>>;
}
