//! Location lookups composed from the postcode, police and bike datasets

use std::sync::Arc;

use hyperion_core::{
    CachingError, CrimeReport, DatasetId, FeedBatch, Fetcher, GeoStore, KeyError, LocationKey,
    NearbyPlaces, NearbyQuery, Neighbourhood, NoopMetrics, PlaceKey, Resolved, ResolvedLocation,
    ResolverMetrics, StolenBike, Store,
};

use crate::breaker::BreakerConfig;
use crate::geo::{GeoError, GeoIndex, Nearby};
use crate::resolver::{CacheAsideResolver, ResolverConfig};

/// Dataset the bike register feed is stored under
pub const STOLEN_BIKES: &str = "stolen-bikes";

/// Radius used when a caller does not give one
pub const DEFAULT_RADIUS_KM: f64 = 10.0;

/// Points of interest returned when a caller does not give a limit
pub const DEFAULT_NEARBY_LIMIT: u32 = 10;

/// Most points of interest a geosearch upstream will return
pub const MAX_NEARBY_LIMIT: u32 = 500;

pub type PostcodeResolver<M = NoopMetrics> = CacheAsideResolver<
    ResolvedLocation,
    Arc<dyn Store<ResolvedLocation>>,
    Arc<dyn Fetcher<ResolvedLocation>>,
    M,
>;

pub type NeighbourhoodResolver<M = NoopMetrics> =
    CacheAsideResolver<Neighbourhood, Arc<dyn Store<Neighbourhood>>, Arc<dyn Fetcher<Neighbourhood>>, M>;

pub type CrimeResolver<M = NoopMetrics> =
    CacheAsideResolver<CrimeReport, Arc<dyn Store<CrimeReport>>, Arc<dyn Fetcher<CrimeReport>>, M>;

pub type PlacesResolver<M = NoopMetrics> =
    CacheAsideResolver<NearbyPlaces, Arc<dyn Store<NearbyPlaces>>, Arc<dyn Fetcher<NearbyPlaces>>, M>;

pub type BikeRegisterResolver<M = NoopMetrics> = CacheAsideResolver<
    FeedBatch<StolenBike>,
    Arc<dyn Store<FeedBatch<StolenBike>>>,
    Arc<dyn Fetcher<FeedBatch<StolenBike>>>,
    M,
>;

pub type BikeIndex = GeoIndex<StolenBike, Arc<dyn GeoStore<StolenBike>>>;

/// Resolver for postcode coordinates, guarded like postcodes.io
pub fn postcode_resolver(
    store: impl Store<ResolvedLocation>,
    fetcher: impl Fetcher<ResolvedLocation>,
) -> PostcodeResolver {
    CacheAsideResolver::new(
        Arc::new(store) as Arc<dyn Store<ResolvedLocation>>,
        Arc::new(fetcher) as Arc<dyn Fetcher<ResolvedLocation>>,
        ResolverConfig::new("postcodes").with_breaker(BreakerConfig::postcodes()),
    )
}

/// Resolver for police neighbourhoods
pub fn neighbourhood_resolver(
    store: impl Store<Neighbourhood>,
    fetcher: impl Fetcher<Neighbourhood>,
) -> NeighbourhoodResolver {
    CacheAsideResolver::new(
        Arc::new(store) as Arc<dyn Store<Neighbourhood>>,
        Arc::new(fetcher) as Arc<dyn Fetcher<Neighbourhood>>,
        ResolverConfig::new("police").with_breaker(BreakerConfig::police()),
    )
}

/// Resolver for street-level crime
///
/// Crime and neighbourhoods come from the same provider; [`LocationService`]
/// puts both behind one breaker.
pub fn crime_resolver(
    store: impl Store<CrimeReport>,
    fetcher: impl Fetcher<CrimeReport>,
) -> CrimeResolver {
    CacheAsideResolver::new(
        Arc::new(store) as Arc<dyn Store<CrimeReport>>,
        Arc::new(fetcher) as Arc<dyn Fetcher<CrimeReport>>,
        ResolverConfig::new("police").with_breaker(BreakerConfig::police()),
    )
}

/// Resolver for points of interest from a geosearch upstream
pub fn places_resolver(
    store: impl Store<NearbyPlaces>,
    fetcher: impl Fetcher<NearbyPlaces>,
) -> PlacesResolver {
    CacheAsideResolver::new(
        Arc::new(store) as Arc<dyn Store<NearbyPlaces>>,
        Arc::new(fetcher) as Arc<dyn Fetcher<NearbyPlaces>>,
        ResolverConfig::new("wikipedia").with_breaker(BreakerConfig::wikipedia()),
    )
}

/// Resolver that merges the bike register feed into `store`
pub fn bike_register_resolver(
    store: impl Store<FeedBatch<StolenBike>>,
    fetcher: impl Fetcher<FeedBatch<StolenBike>>,
) -> BikeRegisterResolver {
    CacheAsideResolver::new(
        Arc::new(store) as Arc<dyn Store<FeedBatch<StolenBike>>>,
        Arc::new(fetcher) as Arc<dyn Fetcher<FeedBatch<StolenBike>>>,
        ResolverConfig::new("bike-register").with_breaker(BreakerConfig::bike_register()),
    )
}

/// Radius search over the stored bike register
pub fn bike_index(store: impl GeoStore<StolenBike>) -> BikeIndex {
    GeoIndex::new(
        Arc::new(store) as Arc<dyn GeoStore<StolenBike>>,
        DatasetId::new(STOLEN_BIKES),
    )
}

/// Broad outcome class, for whoever turns errors into responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The request itself was wrong or names nothing (4xx)
    ClientError,
    /// We could not answer right now (5xx)
    ServerError,
}

/// Error from a [`LocationService`] lookup
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    #[error("invalid radius: {0}")]
    InvalidRadius(f64),

    #[error("invalid limit: {0} (expected 1 to 500)")]
    InvalidLimit(u32),

    /// The postcode has no location
    #[error("postcode {0} does not exist")]
    NotFound(String),

    #[error(transparent)]
    Caching(#[from] CachingError),

    #[error(transparent)]
    Geo(#[from] GeoError),
}

impl ServiceError {
    pub fn status_class(&self) -> StatusClass {
        match self {
            ServiceError::InvalidKey(_)
            | ServiceError::InvalidRadius(_)
            | ServiceError::InvalidLimit(_)
            | ServiceError::NotFound(_) => StatusClass::ClientError,
            ServiceError::Caching(_) | ServiceError::Geo(_) => StatusClass::ServerError,
        }
    }
}

/// Upstream resolvers a [`LocationService`] is built from
pub struct Resolvers<M = NoopMetrics>
where
    M: ResolverMetrics,
{
    pub postcodes: PostcodeResolver<M>,
    pub neighbourhoods: NeighbourhoodResolver<M>,
    pub crimes: CrimeResolver<M>,
    pub places: PlacesResolver<M>,
}

/// Postcode, neighbourhood, crime, points-of-interest and stolen-bike
/// lookups over cached upstreams
pub struct LocationService<M = NoopMetrics>
where
    M: ResolverMetrics,
{
    postcodes: PostcodeResolver<M>,
    neighbourhoods: NeighbourhoodResolver<M>,
    crimes: CrimeResolver<M>,
    places: PlacesResolver<M>,
    bikes: BikeIndex,
    default_radius_km: f64,
}

impl<M: ResolverMetrics> LocationService<M> {
    /// The crime resolver is re-pointed at the neighbourhood resolver's
    /// breaker, so a police outage trips once for both.
    pub fn new(resolvers: Resolvers<M>, bikes: BikeIndex) -> Self {
        let police = resolvers.neighbourhoods.breaker().clone();
        Self {
            postcodes: resolvers.postcodes,
            neighbourhoods: resolvers.neighbourhoods,
            crimes: resolvers.crimes.with_breaker(police),
            places: resolvers.places,
            bikes,
            default_radius_km: DEFAULT_RADIUS_KM,
        }
    }

    pub fn with_default_radius(mut self, radius_km: f64) -> Self {
        self.default_radius_km = radius_km;
        self
    }

    pub fn postcodes(&self) -> &PostcodeResolver<M> {
        &self.postcodes
    }

    pub fn neighbourhoods(&self) -> &NeighbourhoodResolver<M> {
        &self.neighbourhoods
    }

    pub fn crimes(&self) -> &CrimeResolver<M> {
        &self.crimes
    }

    pub fn places(&self) -> &PlacesResolver<M> {
        &self.places
    }

    /// Coordinates and admin areas of a UK postcode
    pub async fn postcode(&self, raw: &str) -> Result<Resolved<ResolvedLocation>, ServiceError> {
        let key = LocationKey::postcode(raw)?;
        Ok(self.postcodes.resolve(&key).await?)
    }

    /// The police neighbourhood covering a postcode
    pub async fn neighbourhood(&self, raw: &str) -> Result<Resolved<Neighbourhood>, ServiceError> {
        let location = match self.postcode(raw).await?.value() {
            Some(location) => location,
            None => return Ok(Resolved::NotFound),
        };

        let place = PlaceKey::from(&location);
        Ok(self.neighbourhoods.resolve(&place).await?)
    }

    /// Street crime reported around a postcode
    pub async fn crime(&self, raw: &str) -> Result<Resolved<CrimeReport>, ServiceError> {
        let location = match self.postcode(raw).await?.value() {
            Some(location) => location,
            None => return Ok(Resolved::NotFound),
        };

        let place = PlaceKey::from(&location);
        Ok(self.crimes.resolve(&place).await?)
    }

    /// Up to `limit` (default 10) points of interest within 10 km of a
    /// postcode, nearest first
    pub async fn nearby(
        &self,
        raw: &str,
        limit: Option<u32>,
    ) -> Result<Resolved<NearbyPlaces>, ServiceError> {
        let limit = limit.unwrap_or(DEFAULT_NEARBY_LIMIT);
        if !(1..=MAX_NEARBY_LIMIT).contains(&limit) {
            return Err(ServiceError::InvalidLimit(limit));
        }

        let location = match self.postcode(raw).await?.value() {
            Some(location) => location,
            None => return Ok(Resolved::NotFound),
        };

        let query = NearbyQuery::new(PlaceKey::from(&location), limit);
        Ok(self.places.resolve(&query).await?)
    }

    /// Stolen bikes reported within `radius_km` (default 10 km) of a
    /// postcode, nearest first
    pub async fn stolen_bikes(
        &self,
        raw: &str,
        radius_km: Option<f64>,
    ) -> Result<Vec<Nearby<StolenBike>>, ServiceError> {
        let radius_km = radius_km.unwrap_or(self.default_radius_km);
        if !(radius_km.is_finite() && radius_km > 0.0) {
            return Err(ServiceError::InvalidRadius(radius_km));
        }

        let key = LocationKey::postcode(raw)?;
        let location = match self.postcodes.resolve(&key).await?.value() {
            Some(location) => location,
            None => return Err(ServiceError::NotFound(key.to_string())),
        };

        Ok(self.bikes.within(location.coordinates, radius_km).await?)
    }
}
