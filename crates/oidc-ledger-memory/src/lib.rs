//! In-memory storage backend for the OIDC authorization ledger.
//!
//! This crate implements the `GrantStore`, `ClientDirectory` and
//! `ConsentStore` traits from `oidc-ledger` in process memory. State does not
//! survive a restart and is not shared between instances, so it suits tests
//! and single-node deployments.
//!
//! # Example
//!
//! ```ignore
//! use oidc_ledger::LedgerConfig;
//! use oidc_ledger_memory::InMemoryLedgerStorage;
//!
//! let storage = InMemoryLedgerStorage::new();
//! let ledger = storage.authorization_ledger(&LedgerConfig::default())?;
//! ledger.save(&grant).await?;
//! ```

mod client;
mod consent;
mod grant;

use std::sync::Arc;

use oidc_ledger::{AuthorizationLedger, ConsentLedger, LedgerConfig, LedgerResult};

pub use client::InMemoryClientDirectory;
pub use consent::InMemoryConsentStore;
pub use grant::InMemoryGrantStore;

/// Bundles the three in-memory stores.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStorage {
    grants: Arc<InMemoryGrantStore>,
    clients: Arc<InMemoryClientDirectory>,
    consents: Arc<InMemoryConsentStore>,
}

impl InMemoryLedgerStorage {
    /// Creates empty stores.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the grant store.
    pub fn grants(&self) -> &Arc<InMemoryGrantStore> {
        &self.grants
    }

    /// Returns the client directory.
    pub fn clients(&self) -> &Arc<InMemoryClientDirectory> {
        &self.clients
    }

    /// Returns the consent store.
    pub fn consents(&self) -> &Arc<InMemoryConsentStore> {
        &self.consents
    }

    /// Creates an authorization ledger over these stores.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Configuration` if `config` does not validate.
    pub fn authorization_ledger(
        &self,
        config: &LedgerConfig,
    ) -> LedgerResult<AuthorizationLedger> {
        AuthorizationLedger::from_config(self.grants.clone(), self.clients.clone(), config)
    }

    /// Creates a consent ledger over these stores.
    pub fn consent_ledger(&self) -> ConsentLedger {
        ConsentLedger::new(self.consents.clone(), self.clients.clone())
    }
}
