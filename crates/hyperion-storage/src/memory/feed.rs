//! In-memory store for geo-tagged feed records

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hyperion_core::{
    BoundingBox, Clock, DatasetId, FeedBatch, GeoStore, GeoTaggedRecord, SequenceId, Store,
    StoreError, StoreStats, SystemClock,
};

use super::grid_index::{GridConfig, GridIndex};
use crate::snapshot;

/// What a merge changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    /// Records added to the dataset
    pub inserted: usize,
    /// Items at or below the watermark, duplicated, or without a position
    pub skipped: usize,
    /// Highest sequence id seen after the merge
    pub watermark: Option<SequenceId>,
}

struct Dataset<R> {
    records: BTreeMap<SequenceId, GeoTaggedRecord<R>>,
    grid: GridIndex,
    watermark: Option<SequenceId>,
    last_merged_at: Option<DateTime<Utc>>,
}

impl<R> Dataset<R> {
    fn new(grid: GridConfig) -> Self {
        Self {
            records: BTreeMap::new(),
            grid: GridIndex::new(grid),
            watermark: None,
            last_merged_at: None,
        }
    }

    fn insert(&mut self, record: GeoTaggedRecord<R>) {
        self.grid.insert(&record.coordinates, record.sequence_id);
        self.records.insert(record.sequence_id, record);
    }
}

#[derive(Serialize, Deserialize)]
struct DatasetSnapshot<R> {
    dataset: DatasetId,
    watermark: Option<SequenceId>,
    last_merged_at: Option<DateTime<Utc>>,
    records: Vec<GeoTaggedRecord<R>>,
}

/// Append-only, per-dataset record store with a spatial index
///
/// A merge holds the write lock for the whole batch, so a bounding-box query
/// never observes half a merge. Cloning creates a new handle to the SAME
/// underlying store.
pub struct MemoryFeedStore<R> {
    datasets: Arc<RwLock<HashMap<DatasetId, Dataset<R>>>>,
    stats: Arc<RwLock<StoreStats>>,
    clock: Arc<dyn Clock>,
    grid: GridConfig,
    snapshot_path: Option<Arc<PathBuf>>,
}

impl<R> Clone for MemoryFeedStore<R> {
    fn clone(&self) -> Self {
        Self {
            datasets: Arc::clone(&self.datasets),
            stats: Arc::clone(&self.stats),
            clock: Arc::clone(&self.clock),
            grid: self.grid,
            snapshot_path: self.snapshot_path.clone(),
        }
    }
}

impl<R: Clone> MemoryFeedStore<R> {
    pub fn new(grid: GridConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            datasets: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(StoreStats::default())),
            clock,
            grid,
            snapshot_path: None,
        }
    }

    /// Create with the default grid and the system clock
    pub fn with_defaults() -> Self {
        Self::new(GridConfig::default(), Arc::new(SystemClock))
    }

    /// Merge every item whose sequence id is above the current watermark
    ///
    /// Replaying a batch is a no-op apart from refreshing the merge time.
    pub fn merge(&self, batch: FeedBatch<R>) -> MergeSummary {
        let now = self.clock.now();
        let FeedBatch { dataset, items } = batch;

        let mut datasets = self.datasets.write();
        let entry = datasets
            .entry(dataset.clone())
            .or_insert_with(|| Dataset::new(self.grid));

        let floor = entry.watermark;
        let mut summary = MergeSummary::default();

        for item in items {
            let id = item.sequence_id;
            if floor.is_some_and(|floor| id <= floor) || entry.records.contains_key(&id) {
                summary.skipped += 1;
                continue;
            }

            entry.watermark = entry.watermark.max(Some(id));
            match GeoTaggedRecord::from_item(dataset.clone(), item, now) {
                Some(record) => {
                    entry.insert(record);
                    summary.inserted += 1;
                }
                None => summary.skipped += 1,
            }
        }

        entry.last_merged_at = Some(now);
        summary.watermark = entry.watermark;
        drop(datasets);

        self.stats.write().writes += summary.inserted as u64;

        tracing::debug!(
            target: "hyperion",
            dataset = %dataset,
            inserted = summary.inserted,
            skipped = summary.skipped,
            watermark = ?summary.watermark,
            "Merged feed batch"
        );

        summary
    }

    /// Records stored for `dataset`
    pub fn len(&self, dataset: &DatasetId) -> usize {
        self.datasets
            .read()
            .get(dataset)
            .map_or(0, |entry| entry.records.len())
    }

    /// Records stored across all datasets
    pub fn total_len(&self) -> usize {
        self.datasets
            .read()
            .values()
            .map(|entry| entry.records.len())
            .sum()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.total_len(),
            ..self.stats.read().clone()
        }
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref().map(PathBuf::as_path)
    }
}

impl<R> MemoryFeedStore<R>
where
    R: Clone + Serialize + DeserializeOwned,
{
    /// Open a store backed by a JSON snapshot, loading it if present
    pub async fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut store = Self::new(GridConfig::default(), clock);

        if let Some(snapshots) = snapshot::read_json::<Vec<DatasetSnapshot<R>>>(&path).await? {
            let mut datasets = store.datasets.write();
            for snap in snapshots {
                let mut entry = Dataset::new(store.grid);
                entry.watermark = snap.watermark;
                entry.last_merged_at = snap.last_merged_at;
                for record in snap.records {
                    entry.insert(record);
                }
                datasets.insert(snap.dataset, entry);
            }
        }

        tracing::debug!(
            target: "hyperion",
            path = %path.display(),
            records = store.total_len(),
            "Opened feed store"
        );

        store.snapshot_path = Some(Arc::new(path));
        Ok(store)
    }

    /// Write the snapshot; a no-op for stores not opened from a path
    pub async fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = self.snapshot_path.as_deref() else {
            return Ok(());
        };

        let snapshots: Vec<DatasetSnapshot<R>> = self
            .datasets
            .read()
            .iter()
            .map(|(dataset, entry)| DatasetSnapshot {
                dataset: dataset.clone(),
                watermark: entry.watermark,
                last_merged_at: entry.last_merged_at,
                records: entry.records.values().cloned().collect(),
            })
            .collect();

        snapshot::write_json_atomic(path, &snapshots).await
    }

    /// Flush and release the handle
    pub async fn close(self) -> Result<(), StoreError> {
        self.flush().await
    }
}

#[async_trait]
impl<R> Store<FeedBatch<R>> for MemoryFeedStore<R>
where
    R: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &DatasetId) -> Result<Option<FeedBatch<R>>, StoreError> {
        let batch = self.datasets.read().get(key).map(|entry| {
            let items = entry
                .records
                .values()
                .cloned()
                .map(GeoTaggedRecord::into_item)
                .collect();
            FeedBatch::new(key.clone(), items)
        });

        let mut stats = self.stats.write();
        if batch.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        Ok(batch)
    }

    async fn upsert(&self, batch: FeedBatch<R>) -> Result<(), StoreError> {
        self.merge(batch);
        Ok(())
    }

    /// Time of the last merge, even one that added nothing
    async fn cached_at(&self, key: &DatasetId) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .datasets
            .read()
            .get(key)
            .and_then(|entry| entry.last_merged_at))
    }
}

#[async_trait]
impl<R> GeoStore<R> for MemoryFeedStore<R>
where
    R: Clone + Send + Sync + 'static,
{
    async fn query_bounding_box(
        &self,
        dataset: &DatasetId,
        bbox: &BoundingBox,
    ) -> Result<Vec<GeoTaggedRecord<R>>, StoreError> {
        let records = match self.datasets.read().get(dataset) {
            Some(entry) => entry
                .grid
                .candidates(bbox)
                .into_iter()
                .filter_map(|id| entry.records.get(&id))
                .filter(|record| bbox.contains(&record.coordinates))
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        self.stats.write().range_queries += 1;
        Ok(records)
    }

    async fn most_recent_sequence_id(
        &self,
        dataset: &DatasetId,
    ) -> Result<Option<SequenceId>, StoreError> {
        Ok(self
            .datasets
            .read()
            .get(dataset)
            .and_then(|entry| entry.watermark))
    }
}
