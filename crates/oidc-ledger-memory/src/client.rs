use std::sync::Arc;

use async_trait::async_trait;
use oidc_ledger::storage::ClientDirectory;
use oidc_ledger::{LedgerError, LedgerResult, RegisteredClient};
use papaya::HashMap as PapayaHashMap;
use tokio::sync::Mutex;

/// In-memory registered client directory using papaya lock-free maps.
///
/// Reads are lock-free. Saves are serialized so the `client_id` check and
/// both map writes happen as one step.
#[derive(Debug, Default)]
pub struct InMemoryClientDirectory {
    /// id -> client
    clients: PapayaHashMap<String, Arc<RegisteredClient>>,
    /// client_id -> id
    aliases: PapayaHashMap<String, String>,
    writes: Mutex<()>,
}

impl InMemoryClientDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.pin().len()
    }

    /// Returns `true` if no clients are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ClientDirectory for InMemoryClientDirectory {
    async fn find_by_id(&self, id: &str) -> LedgerResult<Option<Arc<RegisteredClient>>> {
        let guard = self.clients.pin();
        Ok(guard.get(id).cloned())
    }

    async fn find_by_client_id(
        &self,
        client_id: &str,
    ) -> LedgerResult<Option<Arc<RegisteredClient>>> {
        let aliases = self.aliases.pin();
        let Some(id) = aliases.get(client_id) else {
            return Ok(None);
        };
        let clients = self.clients.pin();
        Ok(clients.get(id).cloned())
    }

    async fn save(&self, client: &RegisteredClient) -> LedgerResult<()> {
        client.validate()?;

        let _write = self.writes.lock().await;
        let clients = self.clients.pin();
        let aliases = self.aliases.pin();

        if let Some(owner) = aliases.get(&client.client_id)
            && owner != &client.id
        {
            return Err(LedgerError::invalid_client(format!(
                "client_id '{}' is already registered",
                client.client_id
            )));
        }

        if let Some(previous) = clients.get(&client.id)
            && previous.client_id != client.client_id
        {
            aliases.remove(&previous.client_id);
        }

        aliases.insert(client.client_id.clone(), client.id.clone());
        clients.insert(client.id.clone(), Arc::new(client.clone()));
        Ok(())
    }
}
