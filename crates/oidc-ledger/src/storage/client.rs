//! Registered client directory trait.
//!
//! Grants reference their client by the registered client's `id`; the
//! authorization and token endpoints resolve clients by the public
//! `client_id`. Implementations must support both lookups efficiently.

use std::sync::Arc;

use async_trait::async_trait;

use crate::LedgerResult;
use crate::types::RegisteredClient;

/// Storage trait for registered clients.
///
/// # Example
///
/// ```ignore
/// use oidc_ledger::storage::ClientDirectory;
///
/// async fn example(directory: &impl ClientDirectory) {
///     if let Some(client) = directory.find_by_client_id("web-app").await? {
///         println!("Found client: {}", client.client_name);
///     }
/// }
/// ```
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    /// Finds a client by its internal `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: &str) -> LedgerResult<Option<Arc<RegisteredClient>>>;

    /// Finds a client by its public `client_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str)
    -> LedgerResult<Option<Arc<RegisteredClient>>>;

    /// Inserts or replaces a client, keyed by `id`.
    ///
    /// Implementations call [`RegisteredClient::validate`] first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidClient` if validation fails, or an error
    /// if the storage operation fails.
    async fn save(&self, client: &RegisteredClient) -> LedgerResult<()>;
}
