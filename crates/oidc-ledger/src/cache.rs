//! Registered client caching.
//!
//! Every grant materialization resolves the grant's registered client, so
//! [`CachedClientDirectory`] keeps recently used clients in memory in front
//! of any [`ClientDirectory`] backend.
//!
//! ## Keys
//!
//! Entries are stored by the client's internal `id`. A second map resolves
//! the public `client_id` to that `id`, so both lookups share one entry.
//!
//! ## Invalidation
//!
//! Writes through [`ClientDirectory::save`] drop the affected entries. Clients
//! changed out of band (another instance, an admin tool) must be dropped with
//! [`CachedClientDirectory::invalidate`] or wait for the TTL. Absent clients
//! are never cached.
//!
//! Every invalidation bumps a generation counter. A miss remembers the
//! generation it started under and drops its own insert if an invalidation
//! ran while the backend lookup was in flight, so a slow read never parks a
//! superseded client in the cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::LedgerResult;
use crate::storage::ClientDirectory;
use crate::types::RegisteredClient;

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of clients currently cached.
    pub size: usize,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries dropped because their TTL elapsed.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct CachedEntry {
    client: Arc<RegisteredClient>,
    expires_at: Option<Instant>,
}

impl CachedEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// A [`ClientDirectory`] that caches the clients of another directory.
pub struct CachedClientDirectory {
    inner: Arc<dyn ClientDirectory>,
    by_id: DashMap<String, CachedEntry>,
    by_client_id: DashMap<String, String>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    generation: AtomicU64,
}

impl CachedClientDirectory {
    /// Wraps `inner`. With `ttl` of `None`, entries live until invalidated.
    pub fn new(inner: Arc<dyn ClientDirectory>, ttl: Option<Duration>) -> Self {
        Self {
            inner,
            by_id: DashMap::new(),
            by_client_id: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Drops the cached client with the given public `client_id`.
    pub fn invalidate(&self, client_id: &str) {
        self.bump_generation();
        if let Some((_, id)) = self.by_client_id.remove(client_id) {
            self.by_id.remove(&id);
            debug!(client_id = %client_id, "Invalidated cached client");
        }
    }

    /// Drops the cached client with the given internal `id`.
    pub fn invalidate_id(&self, id: &str) {
        self.bump_generation();
        self.remove_id(id);
    }

    /// Drops every cached client.
    pub fn invalidate_all(&self) {
        self.bump_generation();
        self.by_id.clear();
        self.by_client_id.clear();
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.by_id.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn get(&self, id: &str) -> Option<Arc<RegisteredClient>> {
        let now = Instant::now();

        if let Some(entry) = self.by_id.get(id) {
            if entry.is_fresh(now) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.client));
            }
            // Expired, drop both keys
            drop(entry);
            self.remove_id(id);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn remove_id(&self, id: &str) {
        if let Some((_, entry)) = self.by_id.remove(id) {
            self.by_client_id.remove(&entry.client.client_id);
        }
    }

    /// Caches a client loaded under `generation`, unless an invalidation
    /// happened since.
    fn insert_loaded(&self, client: &Arc<RegisteredClient>, generation: u64) {
        if self.current_generation() != generation {
            return;
        }
        self.insert(Arc::clone(client));
        // An invalidation between the check and the insert must still win
        if self.current_generation() != generation {
            self.remove_id(&client.id);
            debug!(id = %client.id, "Dropped client loaded before an invalidation");
        }
    }

    fn insert(&self, client: Arc<RegisteredClient>) {
        let entry = CachedEntry {
            expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
            client: Arc::clone(&client),
        };
        self.by_client_id
            .insert(client.client_id.clone(), client.id.clone());
        self.by_id.insert(client.id.clone(), entry);
    }
}

#[async_trait]
impl ClientDirectory for CachedClientDirectory {
    async fn find_by_id(&self, id: &str) -> LedgerResult<Option<Arc<RegisteredClient>>> {
        if let Some(client) = self.get(id) {
            return Ok(Some(client));
        }

        let generation = self.current_generation();
        let client = self.inner.find_by_id(id).await?;
        if let Some(client) = &client {
            self.insert_loaded(client, generation);
        }
        Ok(client)
    }

    async fn find_by_client_id(
        &self,
        client_id: &str,
    ) -> LedgerResult<Option<Arc<RegisteredClient>>> {
        let id = self.by_client_id.get(client_id).map(|id| id.value().clone());
        let cached = match id {
            Some(id) => self.get(&id),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        };
        if cached.is_some() {
            return Ok(cached);
        }

        let generation = self.current_generation();
        let client = self.inner.find_by_client_id(client_id).await?;
        if let Some(client) = &client {
            self.insert_loaded(client, generation);
        }
        Ok(client)
    }

    async fn save(&self, client: &RegisteredClient) -> LedgerResult<()> {
        self.inner.save(client).await?;
        self.bump_generation();
        self.remove_id(&client.id);
        if let Some((_, id)) = self.by_client_id.remove(&client.client_id) {
            self.by_id.remove(&id);
        }
        Ok(())
    }
}
