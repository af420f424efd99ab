use std::collections::HashMap;

use async_trait::async_trait;
use oidc_ledger::storage::{GrantRow, GrantStore};
use oidc_ledger::{LedgerError, LedgerResult, TokenKind};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct GrantTable {
    rows: HashMap<String, GrantRow>,
    /// value -> (grant id, kind)
    index: HashMap<String, (String, TokenKind)>,
}

impl GrantTable {
    fn unindex(&mut self, row: &GrantRow) {
        for (_, value) in row.token_index() {
            self.index.remove(value);
        }
    }
}

/// In-memory grant store.
///
/// Rows and the token index share one lock, so a writer's row and index
/// changes are visible together and a conflicting upsert changes nothing.
#[derive(Debug, Default)]
pub struct InMemoryGrantStore {
    table: RwLock<GrantTable>,
}

impl InMemoryGrantStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored grants.
    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    /// Returns `true` if no grants are stored.
    pub async fn is_empty(&self) -> bool {
        self.table.read().await.rows.is_empty()
    }
}

#[async_trait]
impl GrantStore for InMemoryGrantStore {
    async fn upsert(&self, row: &GrantRow) -> LedgerResult<()> {
        let mut guard = self.table.write().await;
        let table = &mut *guard;

        let keys = row.token_index();
        for (kind, value) in &keys {
            if let Some((owner, _)) = table.index.get(*value)
                && owner != &row.id
            {
                return Err(LedgerError::duplicate_token(kind.as_str()));
            }
        }

        if let Some(previous) = table.rows.remove(&row.id) {
            table.unindex(&previous);
        }
        for (kind, value) in keys {
            table
                .index
                .insert(value.to_string(), (row.id.clone(), kind));
        }
        table.rows.insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> LedgerResult<bool> {
        let mut table = self.table.write().await;
        match table.rows.remove(id) {
            Some(row) => {
                table.unindex(&row);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_id(&self, id: &str) -> LedgerResult<Option<GrantRow>> {
        Ok(self.table.read().await.rows.get(id).cloned())
    }

    async fn find_by_token(
        &self,
        value: &str,
        kinds: &[TokenKind],
    ) -> LedgerResult<Option<GrantRow>> {
        let table = self.table.read().await;
        Ok(table
            .index
            .get(value)
            .filter(|(_, kind)| kinds.contains(kind))
            .and_then(|(id, _)| table.rows.get(id))
            .cloned())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> LedgerResult<u64> {
        let mut table = self.table.write().await;
        let expired: Vec<String> = table
            .rows
            .values()
            .filter(|row| row.is_expired_at(now))
            .map(|row| row.id.clone())
            .collect();

        for id in &expired {
            if let Some(row) = table.rows.remove(id) {
                table.unindex(&row);
            }
        }

        if !expired.is_empty() {
            debug!(removed = expired.len(), "Deleted expired grants");
        }
        Ok(expired.len() as u64)
    }
}
