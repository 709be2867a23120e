//! Store traits

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::key::CacheKey;
use crate::{
    BoundingBox, CrimeReport, DatasetId, FeedBatch, GeoTaggedRecord, LocationKey, NearbyPlaces,
    NearbyQuery, Neighbourhood, PlaceKey, ResolvedLocation, SequenceId, StoreError,
};

/// A value the resolver can cache, addressed by its key
pub trait Entity: Clone + Send + Sync + 'static {
    type Key: CacheKey;

    fn key(&self) -> Self::Key;
}

impl Entity for ResolvedLocation {
    type Key = LocationKey;

    fn key(&self) -> LocationKey {
        self.key.clone()
    }
}

impl Entity for Neighbourhood {
    type Key = PlaceKey;

    fn key(&self) -> PlaceKey {
        self.place()
    }
}

impl Entity for CrimeReport {
    type Key = PlaceKey;

    fn key(&self) -> PlaceKey {
        self.place()
    }
}

impl Entity for NearbyPlaces {
    type Key = NearbyQuery;

    fn key(&self) -> NearbyQuery {
        self.query()
    }
}

impl<R> Entity for FeedBatch<R>
where
    R: Clone + Send + Sync + 'static,
{
    type Key = DatasetId;

    fn key(&self) -> DatasetId {
        self.dataset.clone()
    }
}

/// Core trait for entity persistence
///
/// `upsert` must be idempotent and atomic per entity: readers either see the
/// whole entity or none of it.
#[async_trait]
pub trait Store<E: Entity>: Send + Sync + 'static {
    /// Get the entity for `key`, if persisted
    async fn get(&self, key: &E::Key) -> Result<Option<E>, StoreError>;

    /// Insert or replace the entity under its own key
    async fn upsert(&self, entity: E) -> Result<(), StoreError>;

    /// When the entity for `key` was last written
    async fn cached_at(&self, key: &E::Key) -> Result<Option<DateTime<Utc>>, StoreError>;
}

/// Spatial queries over persisted feed records
#[async_trait]
pub trait GeoStore<R>: Send + Sync + 'static {
    /// All records of `dataset` whose position falls inside `bbox`
    async fn query_bounding_box(
        &self,
        dataset: &DatasetId,
        bbox: &BoundingBox,
    ) -> Result<Vec<GeoTaggedRecord<R>>, StoreError>;

    /// Highest sequence id merged so far for `dataset`
    async fn most_recent_sequence_id(
        &self,
        dataset: &DatasetId,
    ) -> Result<Option<SequenceId>, StoreError>;
}

#[async_trait]
impl<E, S> Store<E> for Arc<S>
where
    E: Entity,
    S: Store<E> + ?Sized,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, StoreError> {
        (**self).get(key).await
    }

    async fn upsert(&self, entity: E) -> Result<(), StoreError> {
        (**self).upsert(entity).await
    }

    async fn cached_at(&self, key: &E::Key) -> Result<Option<DateTime<Utc>>, StoreError> {
        (**self).cached_at(key).await
    }
}

#[async_trait]
impl<R, G> GeoStore<R> for Arc<G>
where
    R: Send + Sync + 'static,
    G: GeoStore<R> + ?Sized,
{
    async fn query_bounding_box(
        &self,
        dataset: &DatasetId,
        bbox: &BoundingBox,
    ) -> Result<Vec<GeoTaggedRecord<R>>, StoreError> {
        (**self).query_bounding_box(dataset, bbox).await
    }

    async fn most_recent_sequence_id(
        &self,
        dataset: &DatasetId,
    ) -> Result<Option<SequenceId>, StoreError> {
        (**self).most_recent_sequence_id(dataset).await
    }
}
