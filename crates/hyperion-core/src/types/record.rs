//! Geo-tagged feed records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::location::Coordinates;

/// Upstream-assigned, append-only record identifier
pub type SequenceId = u64;

/// Name of a record feed, e.g. `stolen-bikes`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DatasetId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One item as delivered by an upstream feed
///
/// Upstreams sometimes omit a position; such items still advance the
/// dataset's watermark but are never stored as geo records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem<R> {
    pub sequence_id: SequenceId,
    pub coordinates: Option<Coordinates>,
    pub payload: R,
}

impl<R> FeedItem<R> {
    pub fn new(sequence_id: SequenceId, coordinates: Option<Coordinates>, payload: R) -> Self {
        Self {
            sequence_id,
            coordinates,
            payload,
        }
    }
}

/// A full upstream pull for one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedBatch<R> {
    pub dataset: DatasetId,
    pub items: Vec<FeedItem<R>>,
}

impl<R> FeedBatch<R> {
    pub fn new(dataset: DatasetId, items: Vec<FeedItem<R>>) -> Self {
        Self { dataset, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A persisted record with a position
///
/// Only the store builds these, so every field is set by the time a reader
/// sees one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTaggedRecord<R> {
    pub dataset: DatasetId,
    pub sequence_id: SequenceId,
    pub coordinates: Coordinates,
    pub cached_at: DateTime<Utc>,
    pub payload: R,
}

impl<R> GeoTaggedRecord<R> {
    /// Stamp a feed item; `None` when the item carries no position
    pub fn from_item(
        dataset: DatasetId,
        item: FeedItem<R>,
        cached_at: DateTime<Utc>,
    ) -> Option<Self> {
        let coordinates = item.coordinates?;
        Some(Self {
            dataset,
            sequence_id: item.sequence_id,
            coordinates: coordinates.rounded(),
            cached_at,
            payload: item.payload,
        })
    }

    /// Back to the upstream shape
    pub fn into_item(self) -> FeedItem<R> {
        FeedItem::new(self.sequence_id, Some(self.coordinates), self.payload)
    }
}

/// A bicycle reported stolen to the bike register
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StolenBike {
    pub make: Option<String>,
    pub model: Option<String>,
    pub colour: Option<String>,
    pub frame_number: Option<String>,
    pub rfid: Option<String>,
    pub description: Option<String>,
    pub reported_at: Option<String>,
}
