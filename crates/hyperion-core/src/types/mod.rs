//! Core types for the data-access layer

mod bbox;
mod crime;
mod entry;
mod location;
mod neighbourhood;
mod places;
mod record;
mod result;
mod stats;

pub use bbox::BoundingBox;
pub use crime::{CrimeReport, StreetCrime};
pub use entry::CachedEntry;
pub use location::{is_uk_postcode, Coordinates, LocationKey, PlaceKey, ResolvedLocation};
pub use neighbourhood::{Contact, Link, Neighbourhood, PoliceLocation};
pub use places::{NearbyPlaces, NearbyQuery, PointOfInterest};
pub use record::{DatasetId, FeedBatch, FeedItem, GeoTaggedRecord, SequenceId, StolenBike};
pub use result::{FetchOutcome, Resolved};
pub use stats::StoreStats;
