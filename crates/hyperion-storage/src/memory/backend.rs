//! In-memory entity store using DashMap

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hyperion_core::{CachedEntry, Clock, Entity, Store, StoreError, StoreStats, SystemClock};

use crate::snapshot;

/// Configuration for the memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    /// Maximum number of entries (0 = unlimited)
    pub max_entries: usize,
}

impl MemoryConfig {
    /// Create config with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            max_entries: capacity,
        }
    }

    /// Create config with unlimited capacity
    pub fn unlimited() -> Self {
        Self::default()
    }
}

/// In-memory store for one entity type
///
/// An upsert is a single map insert of the whole entry, so a reader sees
/// either the previous entity or the new one. Last writer wins.
/// Cloning creates a new handle to the SAME underlying store.
pub struct MemoryStore<E: Entity> {
    data: Arc<DashMap<E::Key, CachedEntry<E>>>,
    stats: Arc<RwLock<StoreStats>>,
    clock: Arc<dyn Clock>,
    config: MemoryConfig,
    snapshot_path: Option<Arc<PathBuf>>,
}

impl<E: Entity> Clone for MemoryStore<E> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            stats: Arc::clone(&self.stats),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            snapshot_path: self.snapshot_path.clone(),
        }
    }
}

impl<E: Entity> MemoryStore<E> {
    /// Create a new memory store
    pub fn new(config: MemoryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            stats: Arc::new(RwLock::new(StoreStats::default())),
            clock,
            config,
            snapshot_path: None,
        }
    }

    /// Create with default configuration and the system clock
    pub fn with_defaults() -> Self {
        Self::new(MemoryConfig::default(), Arc::new(SystemClock))
    }

    /// Number of stored entities
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.data.len(),
            ..self.stats.read().clone()
        }
    }

    pub fn clear(&self) {
        self.data.clear();
    }

    /// Path this store snapshots to, if opened from one
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref().map(PathBuf::as_path)
    }

    /// Drop the oldest entries, never `keep`, until the store is back
    /// within capacity
    ///
    /// Runs after the insert, so concurrent upserts of new keys cannot
    /// leave the store over capacity.
    fn evict_overflow(&self, keep: &E::Key) {
        if self.config.max_entries == 0 {
            return;
        }

        while self.data.len() > self.config.max_entries {
            let oldest = self
                .data
                .iter()
                .filter(|entry| entry.key() != keep)
                .min_by_key(|entry| entry.cached_at)
                .map(|entry| entry.key().clone());

            match oldest {
                Some(key) => {
                    self.data.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl<E> MemoryStore<E>
where
    E: Entity + Serialize + DeserializeOwned,
{
    /// Open a store backed by a JSON snapshot, loading it if present
    pub async fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut store = Self::new(MemoryConfig::default(), clock);

        if let Some(entries) = snapshot::read_json::<Vec<CachedEntry<E>>>(&path).await? {
            for entry in entries {
                store.data.insert(entry.value.key(), entry);
            }
        }

        tracing::debug!(
            target: "hyperion",
            path = %path.display(),
            entries = store.data.len(),
            "Opened entity store"
        );

        store.snapshot_path = Some(Arc::new(path));
        Ok(store)
    }

    /// Write the snapshot; a no-op for stores not opened from a path
    pub async fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = self.snapshot_path.as_deref() else {
            return Ok(());
        };

        let entries: Vec<CachedEntry<E>> =
            self.data.iter().map(|entry| entry.value().clone()).collect();
        snapshot::write_json_atomic(path, &entries).await
    }

    /// Flush and release the handle
    pub async fn close(self) -> Result<(), StoreError> {
        self.flush().await
    }
}

#[async_trait]
impl<E: Entity> Store<E> for MemoryStore<E> {
    async fn get(&self, key: &E::Key) -> Result<Option<E>, StoreError> {
        match self.data.get_mut(key) {
            Some(mut entry) => {
                entry.reads += 1;
                self.stats.write().hits += 1;
                Ok(Some(entry.value.clone()))
            }
            None => {
                self.stats.write().misses += 1;
                Ok(None)
            }
        }
    }

    async fn upsert(&self, entity: E) -> Result<(), StoreError> {
        let key = entity.key();
        self.data
            .insert(key.clone(), CachedEntry::new(entity, self.clock.now()));
        self.evict_overflow(&key);
        self.stats.write().writes += 1;
        Ok(())
    }

    async fn cached_at(&self, key: &E::Key) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.data.get(key).map(|entry| entry.cached_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperion_core::{Coordinates, LocationKey, ManualClock, ResolvedLocation};
    use std::time::Duration;

    fn location(postcode: &str, latitude: f64) -> ResolvedLocation {
        ResolvedLocation::new(
            LocationKey::new(postcode).unwrap(),
            Coordinates::new(latitude, -0.1),
        )
    }

    fn key(postcode: &str) -> LocationKey {
        LocationKey::new(postcode).unwrap()
    }

    #[tokio::test]
    async fn test_basic_get_upsert() {
        let store = MemoryStore::with_defaults();

        store.upsert(location("SW1A 1AA", 51.5)).await.unwrap();

        let result = store.get(&key("sw1a1aa")).await.unwrap();
        assert_eq!(result.unwrap().coordinates.latitude, 51.5);
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let store: MemoryStore<ResolvedLocation> = MemoryStore::with_defaults();
        assert!(store.get(&key("E1 6AN")).await.unwrap().is_none());
        assert!(store.cached_at(&key("E1 6AN")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_restamps() {
        let clock = ManualClock::default();
        let store = MemoryStore::new(MemoryConfig::default(), Arc::new(clock.clone()));

        store.upsert(location("E1 6AN", 51.0)).await.unwrap();
        let first = store.cached_at(&key("E1 6AN")).await.unwrap().unwrap();

        clock.advance(Duration::from_secs(60));
        store.upsert(location("E1 6AN", 52.0)).await.unwrap();
        let second = store.cached_at(&key("E1 6AN")).await.unwrap().unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(second - first, chrono::TimeDelta::seconds(60));
        assert_eq!(
            store.get(&key("E1 6AN")).await.unwrap().unwrap().coordinates.latitude,
            52.0
        );
    }

    #[tokio::test]
    async fn test_stats() {
        let store = MemoryStore::with_defaults();

        store.upsert(location("E1 6AN", 51.0)).await.unwrap();
        store.get(&key("E1 6AN")).await.unwrap();
        store.get(&key("N1 9GU")).await.unwrap();

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let clock = ManualClock::default();
        let store = MemoryStore::new(MemoryConfig::with_capacity(2), Arc::new(clock.clone()));

        store.upsert(location("E1 6AN", 51.0)).await.unwrap();
        clock.advance(Duration::from_secs(1));
        store.upsert(location("N1 9GU", 51.1)).await.unwrap();
        clock.advance(Duration::from_secs(1));
        store.upsert(location("SE1 7PB", 51.2)).await.unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.get(&key("E1 6AN")).await.unwrap().is_none());
        assert!(store.get(&key("SE1 7PB")).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_respect_capacity() {
        let store = MemoryStore::new(MemoryConfig::with_capacity(3), Arc::new(SystemClock));
        store.upsert(location("E1 6AN", 51.0)).await.unwrap();
        store.upsert(location("N1 9GU", 51.1)).await.unwrap();
        store.upsert(location("SE1 7PB", 51.2)).await.unwrap();

        let postcodes = ["W1A 0AX", "M1 1AE", "B33 8TH", "CR2 6XH", "DN55 1PT", "EC1A 1BB"];
        let tasks: Vec<_> = postcodes
            .iter()
            .map(|postcode| {
                let store = store.clone();
                let entity = location(postcode, 52.0);
                tokio::spawn(async move { store.upsert(entity).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(store.len() <= 3, "store grew to {}", store.len());
        assert!(!store.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_data() {
        let store = MemoryStore::with_defaults();
        let handle = store.clone();

        handle.upsert(location("E1 6AN", 51.0)).await.unwrap();
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(handle.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("postcodes.json");
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());

        let store = MemoryStore::<ResolvedLocation>::open(&path, clock.clone())
            .await
            .unwrap();
        assert!(store.is_empty());
        store.upsert(location("E1 6AN", 51.517)).await.unwrap();
        store.close().await.unwrap();

        let reopened = MemoryStore::<ResolvedLocation>::open(&path, clock)
            .await
            .unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.snapshot_path(), Some(path.as_path()));
        assert_eq!(
            reopened.cached_at(&key("E1 6AN")).await.unwrap(),
            Some(DateTime::<Utc>::UNIX_EPOCH)
        );
    }

    #[tokio::test]
    async fn test_flush_without_path_is_noop() {
        let store: MemoryStore<ResolvedLocation> = MemoryStore::with_defaults();
        store.flush().await.unwrap();
        assert!(store.snapshot_path().is_none());
    }
}
