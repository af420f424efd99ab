use async_trait::async_trait;
use oidc_ledger::storage::ConsentStore;
use oidc_ledger::{ConsentRecord, LedgerResult};
use papaya::HashMap as PapayaHashMap;

type ConsentKey = (String, String);

fn consent_key(client_id: &str, principal_name: &str) -> ConsentKey {
    (client_id.to_string(), principal_name.to_string())
}

/// In-memory consent store keyed by (client, principal).
#[derive(Debug, Default)]
pub struct InMemoryConsentStore {
    records: PapayaHashMap<ConsentKey, ConsentRecord>,
}

impl InMemoryConsentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConsentStore for InMemoryConsentStore {
    async fn save(&self, record: &ConsentRecord) -> LedgerResult<()> {
        let guard = self.records.pin();
        guard.insert(
            consent_key(&record.client_id, &record.principal_name),
            record.clone(),
        );
        Ok(())
    }

    async fn remove(&self, client_id: &str, principal_name: &str) -> LedgerResult<bool> {
        let guard = self.records.pin();
        Ok(guard.remove(&consent_key(client_id, principal_name)).is_some())
    }

    async fn find_by_id(
        &self,
        client_id: &str,
        principal_name: &str,
    ) -> LedgerResult<Option<ConsentRecord>> {
        let guard = self.records.pin();
        Ok(guard.get(&consent_key(client_id, principal_name)).cloned())
    }
}
