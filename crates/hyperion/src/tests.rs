//! Integration tests for LocationService

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use crate::service::{self, StatusClass, STOLEN_BIKES};
    use crate::{
        BreakerState, GeoError, GeoStore, Neighbourhood, PlaceKey, ServiceError, StoreError,
        StreetCrime, SystemClock,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// postcodes.io stand-in with a fixed table
    #[derive(Default)]
    struct FakePostcodes {
        known: HashMap<String, Coordinates>,
        calls: AtomicUsize,
    }

    impl FakePostcodes {
        fn with(mut self, postcode: &str, latitude: f64, longitude: f64) -> Self {
            self.known
                .insert(postcode.to_string(), Coordinates::new(latitude, longitude));
            self
        }
    }

    #[async_trait]
    impl Fetcher<ResolvedLocation> for FakePostcodes {
        async fn fetch(
            &self,
            key: &LocationKey,
        ) -> std::result::Result<FetchOutcome<ResolvedLocation>, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .known
                .get(key.as_str())
                .map(|c| {
                    ResolvedLocation::new(key.clone(), *c)
                        .with_country("England")
                        .with_district("Westminster")
                })
                .into())
        }
    }

    /// data.police.uk stand-in that remembers where it was asked about
    #[derive(Default)]
    struct FakePolice {
        asked: Mutex<Vec<Coordinates>>,
        down: Mutex<bool>,
    }

    #[async_trait]
    impl Fetcher<Neighbourhood> for FakePolice {
        async fn fetch(
            &self,
            key: &PlaceKey,
        ) -> std::result::Result<FetchOutcome<Neighbourhood>, UpstreamError> {
            self.asked.lock().push(key.coordinates);
            Ok(FetchOutcome::Found(Neighbourhood::new(key, "00BK17N", "St James's")))
        }
    }

    #[async_trait]
    impl Fetcher<CrimeReport> for FakePolice {
        async fn fetch(
            &self,
            key: &PlaceKey,
        ) -> std::result::Result<FetchOutcome<CrimeReport>, UpstreamError> {
            self.asked.lock().push(key.coordinates);
            if *self.down.lock() {
                return Err(UpstreamError::Connection("data.police.uk".into()));
            }
            let crimes = vec![
                StreetCrime::new(54164419, "anti-social-behaviour", "2017-01")
                    .with_street("On or near The Mall", key.coordinates),
                StreetCrime::new(54165316, "burglary", "2017-01")
                    .with_outcome("Investigation complete; no suspect identified"),
                StreetCrime::new(54166302, "burglary", "2017-01"),
            ];
            Ok(FetchOutcome::Found(CrimeReport::new(key, crimes)))
        }
    }

    /// Geosearch stand-in that returns more places than asked for
    #[derive(Default)]
    struct FakeWikipedia {
        asked: Mutex<Vec<NearbyQuery>>,
    }

    #[async_trait]
    impl Fetcher<NearbyPlaces> for FakeWikipedia {
        async fn fetch(
            &self,
            key: &NearbyQuery,
        ) -> std::result::Result<FetchOutcome<NearbyPlaces>, UpstreamError> {
            self.asked.lock().push(key.clone());
            let at = key.place.coordinates;
            let places = (1..=20u64)
                .rev()
                .map(|i| {
                    PointOfInterest::new(i, format!("Landmark {i}"), at, i as f64 * 100.0)
                })
                .collect();
            Ok(FetchOutcome::Found(NearbyPlaces::new(key, places)))
        }
    }

    struct Fixture {
        service: LocationService,
        postcodes: Arc<FakePostcodes>,
        police: Arc<FakePolice>,
        wikipedia: Arc<FakeWikipedia>,
        locations: MemoryStore<ResolvedLocation>,
        bikes: MemoryFeedStore<StolenBike>,
    }

    fn fixture() -> Fixture {
        let postcodes = Arc::new(
            FakePostcodes::default()
                .with("SW1A1AA", 51.501009, -0.141588)
                .with("M11AE", 53.4808, -2.2426),
        );
        let police = Arc::new(FakePolice::default());
        let wikipedia = Arc::new(FakeWikipedia::default());
        let locations = MemoryStore::with_defaults();
        let bikes = MemoryFeedStore::with_defaults();

        let resolvers = Resolvers {
            postcodes: service::postcode_resolver(locations.clone(), Arc::clone(&postcodes)),
            neighbourhoods: service::neighbourhood_resolver(
                MemoryStore::with_defaults(),
                Arc::clone(&police),
            ),
            crimes: service::crime_resolver(MemoryStore::with_defaults(), Arc::clone(&police)),
            places: service::places_resolver(MemoryStore::with_defaults(), Arc::clone(&wikipedia)),
        };
        let service = LocationService::new(resolvers, service::bike_index(bikes.clone()));

        Fixture {
            service,
            postcodes,
            police,
            wikipedia,
            locations,
            bikes,
        }
    }

    fn bike(id: u64, latitude: f64, longitude: f64) -> FeedItem<StolenBike> {
        FeedItem::new(
            id,
            Some(Coordinates::new(latitude, longitude)),
            StolenBike {
                make: Some(format!("make-{id}")),
                ..StolenBike::default()
            },
        )
    }

    #[tokio::test]
    async fn test_postcode_is_fetched_once() {
        let f = fixture();

        let first = f.service.postcode("sw1a 1aa").await.unwrap();
        assert!(matches!(first, Resolved::Fetched(_)));

        let second = f.service.postcode("SW1A1AA").await.unwrap();
        let location = match second {
            Resolved::Cached(location) => location,
            other => panic!("Expected cached location, got {other:?}"),
        };
        assert_eq!(location.coordinates, Coordinates::new(51.501009, -0.141588));
        assert_eq!(location.country, "England");

        assert_eq!(f.postcodes.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.locations.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_postcode_is_not_found_and_not_cached() {
        let f = fixture();

        assert!(f.service.postcode("EC1A 1BB").await.unwrap().is_not_found());
        assert!(f.service.postcode("EC1A 1BB").await.unwrap().is_not_found());

        assert_eq!(f.postcodes.calls.load(Ordering::SeqCst), 2);
        assert!(f.locations.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_postcode_never_reaches_upstream() {
        let f = fixture();

        let err = f.service.postcode("not a postcode").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidKey(_)));
        assert_eq!(err.status_class(), StatusClass::ClientError);
        assert_eq!(f.postcodes.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_neighbourhood_is_queried_by_resolved_position() {
        let f = fixture();

        let neighbourhood = f.service.neighbourhood("SW1A 1AA").await.unwrap();
        let neighbourhood = neighbourhood.value().unwrap();
        assert_eq!(neighbourhood.code, "00BK17N");
        assert_eq!(neighbourhood.postcode.as_str(), "SW1A1AA");

        assert_eq!(
            *f.police.asked.lock(),
            vec![Coordinates::new(51.501009, -0.141588)]
        );

        let again = f.service.neighbourhood("sw1a1aa").await.unwrap();
        assert!(again.is_cached());
        assert_eq!(f.police.asked.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_neighbourhood_of_unknown_postcode() {
        let f = fixture();

        assert!(f.service.neighbourhood("EC1A 1BB").await.unwrap().is_not_found());
        assert!(f.police.asked.lock().is_empty());
    }

    #[tokio::test]
    async fn test_crime_is_queried_by_resolved_position() {
        let f = fixture();

        let report = f.service.crime("SW1A 1AA").await.unwrap();
        assert!(matches!(report, Resolved::Fetched(_)));
        let report = report.value().unwrap();
        assert_eq!(report.crimes.len(), 3);
        assert_eq!(report.count("burglary"), 2);
        assert_eq!(report.position, Coordinates::new(51.501009, -0.141588));

        assert!(f.service.crime("sw1a1aa").await.unwrap().is_cached());
        assert_eq!(f.police.asked.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_crime_of_unknown_postcode() {
        let f = fixture();

        assert!(f.service.crime("EC1A 1BB").await.unwrap().is_not_found());
        assert!(f.police.asked.lock().is_empty());
    }

    #[tokio::test]
    async fn test_police_outage_trips_one_breaker() {
        let f = fixture();
        *f.police.down.lock() = true;

        for _ in 0..3 {
            let err = f.service.crime("SW1A 1AA").await.unwrap_err();
            assert!(matches!(err, ServiceError::Caching(CachingError::Upstream { .. })));
        }

        assert_eq!(f.service.neighbourhoods().breaker().state(), BreakerState::Open);
        let err = f.service.neighbourhood("SW1A 1AA").await.unwrap_err();
        assert!(matches!(err, ServiceError::Caching(ref e) if e.is_unavailable()));
        assert_eq!(err.status_class(), StatusClass::ServerError);
        assert_eq!(f.police.asked.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_nearby_places_respect_limit() {
        let f = fixture();

        let nearby = f.service.nearby("SW1A 1AA", None).await.unwrap().value().unwrap();
        assert_eq!(nearby.places.len(), 10);
        assert_eq!(nearby.places[0].page_id, 1);
        assert!(nearby.places.windows(2).all(|w| w[0].distance_m <= w[1].distance_m));

        let three = f.service.nearby("SW1A 1AA", Some(3)).await.unwrap().value().unwrap();
        let ids: Vec<u64> = three.places.iter().map(|p| p.page_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        assert!(f.service.nearby("sw1a 1aa", Some(3)).await.unwrap().is_cached());
        let asked: Vec<u32> = f.wikipedia.asked.lock().iter().map(|q| q.limit).collect();
        assert_eq!(asked, vec![10, 3]);
        assert_eq!(f.postcodes.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nearby_rejects_bad_limit() {
        let f = fixture();

        for limit in [0, 501] {
            let err = f.service.nearby("SW1A 1AA", Some(limit)).await.unwrap_err();
            assert_eq!(err, ServiceError::InvalidLimit(limit));
            assert_eq!(err.status_class(), StatusClass::ClientError);
        }
        assert!(f.wikipedia.asked.lock().is_empty());
        assert!(f.service.nearby("EC1A 1BB", None).await.unwrap().is_not_found());
    }

    #[tokio::test]
    async fn test_stolen_bikes_nearest_first() {
        let f = fixture();
        f.bikes.merge(FeedBatch::new(
            DatasetId::new(STOLEN_BIKES),
            vec![
                bike(1, 51.52, -0.14),
                bike(2, 51.502, -0.1416),
                bike(3, 53.48, -2.24),
                FeedItem::new(4, None, StolenBike::default()),
            ],
        ));

        let found = f.service.stolen_bikes("SW1A 1AA", None).await.unwrap();
        let ids: Vec<u64> = found.iter().map(|n| n.record.sequence_id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(found[0].record.payload.make.as_deref(), Some("make-2"));

        let close = f.service.stolen_bikes("SW1A 1AA", Some(0.5)).await.unwrap();
        assert_eq!(close.len(), 1);
    }

    #[tokio::test]
    async fn test_stolen_bikes_rejects_bad_radius() {
        let f = fixture();

        for radius in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let err = f.service.stolen_bikes("SW1A 1AA", Some(radius)).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidRadius(_)));
            assert_eq!(err.status_class(), StatusClass::ClientError);
        }
        assert_eq!(f.postcodes.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stolen_bikes_for_unknown_postcode() {
        let f = fixture();

        let err = f.service.stolen_bikes("EC1A 1BB", None).await.unwrap_err();
        assert_eq!(err, ServiceError::NotFound("EC1A1BB".to_string()));
        assert_eq!(err.status_class(), StatusClass::ClientError);
    }

    #[tokio::test]
    async fn test_default_radius_is_configurable() {
        let f = fixture();
        f.bikes.merge(FeedBatch::new(
            DatasetId::new(STOLEN_BIKES),
            vec![bike(1, 51.52, -0.14)],
        ));
        let service = f.service.with_default_radius(1.0);

        assert!(service.stolen_bikes("SW1A 1AA", None).await.unwrap().is_empty());
    }

    #[test]
    fn test_server_side_errors() {
        let caching = ServiceError::from(CachingError::BreakerOpen {
            upstream: "postcodes".into(),
            key: "SW1A1AA".into(),
        });
        assert_eq!(caching.status_class(), StatusClass::ServerError);

        let geo = ServiceError::from(GeoError::from(StoreError::Backend("down".into())));
        assert_eq!(geo.status_class(), StatusClass::ServerError);
    }

    #[tokio::test]
    async fn test_location_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.json");
        let postcodes = Arc::new(FakePostcodes::default().with("M11AE", 53.4808, -2.2426));

        let store = MemoryStore::open(&path, Arc::new(SystemClock)).await.unwrap();
        let resolver = service::postcode_resolver(store.clone(), Arc::clone(&postcodes));
        let key = LocationKey::postcode("M1 1AE").unwrap();
        assert!(matches!(resolver.resolve(&key).await.unwrap(), Resolved::Fetched(_)));
        drop(resolver);
        store.close().await.unwrap();

        let reopened = MemoryStore::open(&path, Arc::new(SystemClock)).await.unwrap();
        let resolver = service::postcode_resolver(reopened, Arc::clone(&postcodes));
        let resolved = resolver.resolve(&key).await.unwrap();
        assert!(resolved.is_cached());
        assert_eq!(postcodes.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bike_feed_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bikes.json");
        let dataset = DatasetId::new(STOLEN_BIKES);

        let store = MemoryFeedStore::open(&path, Arc::new(SystemClock)).await.unwrap();
        store.merge(FeedBatch::new(
            dataset.clone(),
            vec![bike(7, 51.502, -0.1416), FeedItem::new(8, None, StolenBike::default())],
        ));
        store.close().await.unwrap();

        let reopened: MemoryFeedStore<StolenBike> =
            MemoryFeedStore::open(&path, Arc::new(SystemClock)).await.unwrap();
        assert_eq!(reopened.len(&dataset), 1);
        assert_eq!(reopened.most_recent_sequence_id(&dataset).await.unwrap(), Some(8));

        let index = service::bike_index(reopened);
        let found = index
            .within(Coordinates::new(51.501009, -0.141588), 1.0)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
