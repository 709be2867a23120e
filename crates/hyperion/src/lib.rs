//! hyperion: resilient, cached access to location data
//!
//! # Features
//!
//! - **Circuit breakers** per upstream, with a single trial call on recovery
//! - **Request coalescing** so concurrent misses share one upstream call
//! - **Cache-aside resolution** that never touches a healthy cache entry
//! - **Background refresh** of append-only feeds, merged by sequence id
//! - **Radius search** with a bounding-box pre-filter and Vincenty distances
//! - **Location lookups** for postcodes, police neighbourhoods, street crime,
//!   points of interest and stolen bikes
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hyperion::prelude::*;
//! use async_trait::async_trait;
//!
//! struct Postcodes;
//!
//! #[async_trait]
//! impl Fetcher<ResolvedLocation> for Postcodes {
//!     async fn fetch(
//!         &self,
//!         key: &LocationKey,
//!     ) -> std::result::Result<FetchOutcome<ResolvedLocation>, UpstreamError> {
//!         let coordinates = Coordinates::new(51.501009, -0.141588);
//!         Ok(FetchOutcome::Found(ResolvedLocation::new(key.clone(), coordinates)))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let resolver = CacheAsideResolver::new(
//!         MemoryStore::with_defaults(),
//!         Postcodes,
//!         ResolverConfig::new("postcodes").with_breaker(BreakerConfig::postcodes()),
//!     );
//!
//!     let key = LocationKey::postcode("SW1A 1AA")?;
//!     match resolver.resolve(&key).await? {
//!         Resolved::Cached(location) | Resolved::Fetched(location) => {
//!             println!("{} is at {}", location.key, location.coordinates)
//!         }
//!         Resolved::NotFound => println!("no such postcode"),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod breaker;
pub mod geo;
pub mod refresh;
pub mod resolver;
pub mod service;
pub mod singleflight;

// Re-export core
pub use hyperion_core::*;

// Re-export storage
#[cfg(feature = "memory")]
pub use hyperion_storage::{GridConfig, MemoryConfig, MemoryFeedStore, MemoryStore, MergeSummary};

pub use breaker::{BreakerConfig, BreakerError, BreakerState, CircuitBreaker};
pub use geo::{GeoError, GeoIndex, Nearby};
pub use refresh::{BackgroundRefresher, RefreshConfig, RefreshCycle, RefreshHandle};
pub use resolver::{CacheAsideResolver, ResolverConfig};
pub use service::{LocationService, Resolvers, ServiceError, StatusClass};
pub use singleflight::{FlightAbandoned, SingleFlight};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BackgroundRefresher, BreakerConfig, CacheAsideResolver, CachingError, CircuitBreaker,
        Coordinates, CrimeReport, DatasetId, FeedBatch, FeedItem, FetchOutcome, Fetcher,
        GeoIndex, LocationKey, LocationService, Nearby, NearbyPlaces, NearbyQuery,
        PointOfInterest, RefreshConfig, Resolved, ResolvedLocation, ResolverConfig, Resolvers,
        Result, StolenBike, StreetCrime, UpstreamError,
    };

    #[cfg(feature = "memory")]
    pub use crate::{MemoryFeedStore, MemoryStore};
}

#[cfg(test)]
mod tests;
