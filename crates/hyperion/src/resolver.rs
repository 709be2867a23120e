//! Cache-aside resolution for one upstream

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use hyperion_core::{
    CacheKey, CachingError, Clock, Entity, FetchOutcome, Fetcher, NoopMetrics, Resolved,
    ResolverMetrics, ResolverOperation, Result, Store, StoreError, UpstreamError,
};

use crate::breaker::{BreakerConfig, BreakerError, CircuitBreaker};
use crate::singleflight::{FlightAbandoned, SingleFlight};

/// Configuration for a resolver
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Upstream name used in errors, logs and metrics
    pub upstream: String,
    /// Breaker guarding the upstream
    pub breaker: BreakerConfig,
}

impl ResolverConfig {
    pub fn new(upstream: impl Into<String>) -> Self {
        Self {
            upstream: upstream.into(),
            breaker: BreakerConfig::default(),
        }
    }

    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }
}

/// What a coalesced fetch can fail with, before translation
#[derive(Debug, Clone)]
enum FlightError {
    Breaker(BreakerError<UpstreamError>),
    Store(StoreError),
    Abandoned,
}

impl From<FlightAbandoned> for FlightError {
    fn from(_: FlightAbandoned) -> Self {
        FlightError::Abandoned
    }
}

/// Store-first resolver with breaker-guarded, coalesced upstream fetches
///
/// Generic over:
/// - `E`: the entity resolved
/// - `S`: where entities are persisted
/// - `F`: the upstream fetcher
/// - `M`: the metrics collector
pub struct CacheAsideResolver<E, S, F, M = NoopMetrics>
where
    E: Entity,
{
    store: Arc<S>,
    fetcher: Arc<F>,
    breaker: CircuitBreaker,
    flights: SingleFlight<E::Key, FetchOutcome<E>, FlightError>,
    metrics: Arc<M>,
    config: ResolverConfig,
}

impl<E, S, F, M> Clone for CacheAsideResolver<E, S, F, M>
where
    E: Entity,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            fetcher: Arc::clone(&self.fetcher),
            breaker: self.breaker.clone(),
            flights: self.flights.clone(),
            metrics: Arc::clone(&self.metrics),
            config: self.config.clone(),
        }
    }
}

impl<E, S, F> CacheAsideResolver<E, S, F, NoopMetrics>
where
    E: Entity,
    S: Store<E>,
    F: Fetcher<E>,
{
    /// Create a resolver with its own breaker and no metrics
    pub fn new(store: S, fetcher: F, config: ResolverConfig) -> Self {
        let breaker = CircuitBreaker::new(config.upstream.clone(), config.breaker.clone());
        Self {
            store: Arc::new(store),
            fetcher: Arc::new(fetcher),
            breaker,
            flights: SingleFlight::new(),
            metrics: Arc::new(NoopMetrics),
            config,
        }
    }
}

impl<E, S, F, M> CacheAsideResolver<E, S, F, M>
where
    E: Entity,
    S: Store<E>,
    F: Fetcher<E>,
    M: ResolverMetrics,
{
    /// Swap the metrics collector
    pub fn with_metrics<M2: ResolverMetrics>(self, metrics: M2) -> CacheAsideResolver<E, S, F, M2> {
        CacheAsideResolver {
            store: self.store,
            fetcher: self.fetcher,
            breaker: self.breaker,
            flights: self.flights,
            metrics: Arc::new(metrics),
            config: self.config,
        }
    }

    /// Time the breaker with a specific clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.breaker = self.breaker.with_clock(clock);
        self
    }

    /// Guard the upstream with an existing breaker, shared with its other users
    pub fn with_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn upstream(&self) -> &str {
        &self.config.upstream
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve `key`: the store first, the upstream on a miss
    ///
    /// A store hit never touches the breaker or the upstream. Not-found
    /// answers are not persisted, so they are asked again next time.
    ///
    /// A fetched entity is read back from the store, so stores that merge
    /// (feeds) return the merged state rather than the raw upstream answer.
    pub async fn resolve(&self, key: &E::Key) -> Result<Resolved<E>> {
        let start = Instant::now();
        let cached = self.store.get(key).await?;
        self.metrics
            .record_latency(self.upstream(), ResolverOperation::Lookup, start.elapsed());

        if let Some(entity) = cached {
            self.metrics.record_hit(self.upstream(), &key.full_key());
            return Ok(Resolved::Cached(entity));
        }

        self.metrics.record_miss(self.upstream(), &key.full_key());
        let start = Instant::now();
        let outcome = self.fetch_and_persist(key).await;
        self.metrics
            .record_latency(self.upstream(), ResolverOperation::Fetch, start.elapsed());

        match outcome? {
            FetchOutcome::Found(fetched) => Ok(Resolved::Fetched(self.read_back(key, fetched).await?)),
            FetchOutcome::NotFound => {
                self.metrics.record_not_found(self.upstream(), &key.full_key());
                Ok(Resolved::NotFound)
            }
        }
    }

    /// Fetch and persist `key` regardless of what is cached
    ///
    /// Shares in-flight fetches with `resolve`.
    pub async fn force_refresh(&self, key: &E::Key) -> Result<Resolved<E>> {
        let start = Instant::now();
        let outcome = self.fetch_and_persist(key).await;
        self.metrics
            .record_latency(self.upstream(), ResolverOperation::Refresh, start.elapsed());

        match outcome? {
            FetchOutcome::Found(fetched) => Ok(Resolved::Fetched(self.read_back(key, fetched).await?)),
            FetchOutcome::NotFound => {
                self.metrics.record_not_found(self.upstream(), &key.full_key());
                Ok(Resolved::NotFound)
            }
        }
    }

    /// Peek at the store without going upstream
    pub async fn cached(&self, key: &E::Key) -> Result<Option<E>> {
        Ok(self.store.get(key).await?)
    }

    /// When `key` was last persisted
    pub async fn last_cached_at(&self, key: &E::Key) -> Result<Option<DateTime<Utc>>> {
        Ok(self.store.cached_at(key).await?)
    }

    /// What the store holds for `key` after persisting `fetched`
    async fn read_back(&self, key: &E::Key, fetched: E) -> Result<E> {
        Ok(self.store.get(key).await?.unwrap_or(fetched))
    }

    /// One coalesced, breaker-guarded fetch; the write happens inside the
    /// flight so a caller that goes away cannot interrupt it
    async fn fetch_and_persist(&self, key: &E::Key) -> Result<FetchOutcome<E>> {
        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        let breaker = self.breaker.clone();
        let metrics = Arc::clone(&self.metrics);
        let flight_key = key.clone();

        let result = self
            .flights
            .call(key.clone(), move || async move {
                let upstream = breaker.upstream();
                let fetched = breaker
                    .call_classified(|| fetcher.fetch(&flight_key), UpstreamError::is_failure)
                    .await;

                let outcome = match fetched {
                    Ok(outcome) => outcome,
                    Err(BreakerError::Open { upstream }) => {
                        metrics.record_rejected(&upstream);
                        return Err(FlightError::Breaker(BreakerError::Open { upstream }));
                    }
                    Err(BreakerError::Inner(error)) => {
                        metrics.record_fetch_failure(upstream, &error);
                        return Err(FlightError::Breaker(BreakerError::Inner(error)));
                    }
                };

                if let FetchOutcome::Found(entity) = &outcome {
                    let start = Instant::now();
                    store
                        .upsert(entity.clone())
                        .await
                        .map_err(FlightError::Store)?;
                    metrics.record_latency(upstream, ResolverOperation::Persist, start.elapsed());
                }

                Ok(outcome)
            })
            .await;

        result.map_err(|error| self.translate(error, key))
    }

    fn translate(&self, error: FlightError, key: &E::Key) -> CachingError {
        let key = key.full_key();
        match error {
            FlightError::Breaker(BreakerError::Open { upstream }) => {
                CachingError::BreakerOpen { upstream, key }
            }
            FlightError::Breaker(BreakerError::Inner(source)) => CachingError::Upstream {
                upstream: self.config.upstream.clone(),
                key,
                source,
            },
            FlightError::Store(error) => CachingError::Store(error),
            FlightError::Abandoned => CachingError::Abandoned { key },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hyperion_core::{
        Coordinates, DatasetId, FeedBatch, FeedItem, LocationKey, ManualClock, ResolvedLocation,
        StolenBike,
    };
    use hyperion_storage::{MemoryFeedStore, MemoryStore};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted postcode upstream
    #[derive(Default)]
    struct FakePostcodes {
        known: Mutex<HashMap<String, (f64, f64)>>,
        failing: Mutex<Option<UpstreamError>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl FakePostcodes {
        fn with(postcode: &str, latitude: f64, longitude: f64) -> Self {
            let fake = Self::default();
            fake.known
                .lock()
                .insert(postcode.to_string(), (latitude, longitude));
            fake
        }

        fn fail_with(&self, error: Option<UpstreamError>) {
            *self.failing.lock() = error;
        }
    }

    #[async_trait]
    impl Fetcher<ResolvedLocation> for FakePostcodes {
        async fn fetch(
            &self,
            key: &LocationKey,
        ) -> std::result::Result<FetchOutcome<ResolvedLocation>, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(error) = self.failing.lock().clone() {
                return Err(error);
            }
            let known = self.known.lock().get(key.as_str()).copied();
            Ok(known
                .map(|(lat, lon)| ResolvedLocation::new(key.clone(), Coordinates::new(lat, lon)))
                .into())
        }
    }

    type TestResolver =
        CacheAsideResolver<ResolvedLocation, MemoryStore<ResolvedLocation>, Arc<FakePostcodes>>;

    fn resolver(fake: &Arc<FakePostcodes>, clock: &ManualClock) -> TestResolver {
        let clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let store = MemoryStore::new(Default::default(), Arc::clone(&clock));
        CacheAsideResolver::new(
            store,
            Arc::clone(fake),
            ResolverConfig::new("postcodes").with_breaker(BreakerConfig::postcodes()),
        )
        .with_clock(clock)
    }

    fn key(raw: &str) -> LocationKey {
        LocationKey::new(raw).unwrap()
    }

    #[tokio::test]
    async fn test_miss_fetches_then_hits() {
        let fake = Arc::new(FakePostcodes::with("SW1A1AA", 51.501009, -0.141588));
        let resolver = resolver(&fake, &ManualClock::default());

        let first = resolver.resolve(&key("sw1a 1aa")).await.unwrap();
        assert!(matches!(first, Resolved::Fetched(_)));

        for _ in 0..3 {
            let again = resolver.resolve(&key("SW1A1AA")).await.unwrap();
            assert!(again.is_cached());
        }
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);

        resolver.force_refresh(&key("SW1A1AA")).await.unwrap();
        assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let fake = Arc::new(FakePostcodes::default());
        let resolver = resolver(&fake, &ManualClock::default());

        assert_eq!(resolver.resolve(&key("ZZ99 9ZZ")).await.unwrap(), Resolved::NotFound);
        assert_eq!(resolver.resolve(&key("ZZ99 9ZZ")).await.unwrap(), Resolved::NotFound);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
        assert!(resolver.cached(&key("ZZ999ZZ")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upstream_failure_translated() {
        let fake = Arc::new(FakePostcodes::default());
        fake.fail_with(Some(UpstreamError::Timeout));
        let resolver = resolver(&fake, &ManualClock::default());

        let err = resolver.resolve(&key("E1 6AN")).await.unwrap_err();
        assert_eq!(
            err,
            CachingError::Upstream {
                upstream: "postcodes".into(),
                key: "E16AN".into(),
                source: UpstreamError::Timeout,
            }
        );
        assert!(!err.is_unavailable());
    }

    #[tokio::test]
    async fn test_open_breaker_serves_cache_only() {
        let fake = Arc::new(FakePostcodes::with("E16AN", 51.5, -0.07));
        let clock = ManualClock::default();
        let resolver = resolver(&fake, &clock);

        resolver.resolve(&key("E1 6AN")).await.unwrap();

        fake.fail_with(Some(UpstreamError::Connection("api.postcodes.io".into())));
        for _ in 0..3 {
            resolver.resolve(&key("N1 9GU")).await.unwrap_err();
        }
        let calls = fake.calls.load(Ordering::SeqCst);

        let err = resolver.resolve(&key("N1 9GU")).await.unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(err.upstream(), Some("postcodes"));
        assert_eq!(fake.calls.load(Ordering::SeqCst), calls);

        // cached keys are still served
        assert!(resolver.resolve(&key("E1 6AN")).await.unwrap().is_cached());

        fake.fail_with(None);
        clock.advance(Duration::from_secs(3600));
        assert_eq!(resolver.resolve(&key("N1 9GU")).await.unwrap(), Resolved::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_coalesce() {
        let fake = Arc::new(FakePostcodes {
            delay: Some(Duration::from_millis(50)),
            ..FakePostcodes::with("E16AN", 51.5, -0.07)
        });
        let resolver = resolver(&fake, &ManualClock::default());

        let results = futures::future::join_all(
            (0..10).map(|_| {
                let resolver = resolver.clone();
                async move { resolver.resolve(&key("E1 6AN")).await }
            }),
        )
        .await;

        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| matches!(r, Ok(Resolved::Fetched(_)))));
    }

    /// Bike register that returns a fixed batch
    struct FixedRegister(Vec<FeedItem<StolenBike>>);

    #[async_trait]
    impl Fetcher<FeedBatch<StolenBike>> for FixedRegister {
        async fn fetch(
            &self,
            key: &DatasetId,
        ) -> std::result::Result<FetchOutcome<FeedBatch<StolenBike>>, UpstreamError> {
            if self.0.is_empty() {
                return Err(UpstreamError::Status {
                    status: 503,
                    message: "maintenance".into(),
                });
            }
            Ok(FetchOutcome::Found(FeedBatch::new(key.clone(), self.0.clone())))
        }
    }

    #[tokio::test]
    async fn test_feed_miss_returns_merged_state() {
        let positioned = FeedItem::new(
            1,
            Some(Coordinates::new(51.5, -0.12)),
            StolenBike::default(),
        );
        let register = FixedRegister(vec![
            positioned.clone(),
            FeedItem::new(2, None, StolenBike::default()),
        ]);
        let resolver = CacheAsideResolver::new(
            MemoryFeedStore::with_defaults(),
            register,
            ResolverConfig::new("bike-register"),
        );
        let dataset = DatasetId::new("stolen-bikes");

        let batch = match resolver.resolve(&dataset).await.unwrap() {
            Resolved::Fetched(batch) => batch,
            other => panic!("Expected fetched batch, got {other:?}"),
        };
        assert_eq!(batch.items, vec![positioned]);
        assert_eq!(resolver.cached(&dataset).await.unwrap(), Some(batch));
    }

    #[tokio::test]
    async fn test_errors_carry_namespaced_key() {
        let resolver = CacheAsideResolver::new(
            MemoryFeedStore::<StolenBike>::with_defaults(),
            FixedRegister(Vec::new()),
            ResolverConfig::new("bike-register"),
        );

        let err = resolver
            .resolve(&DatasetId::new("stolen-bikes"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CachingError::Upstream { ref key, .. } if key == "dataset:stolen-bikes"
        ));
    }

    #[tokio::test]
    async fn test_last_cached_at_uses_clock() {
        let fake = Arc::new(FakePostcodes::with("E16AN", 51.5, -0.07));
        let clock = ManualClock::default();
        let resolver = resolver(&fake, &clock);

        assert!(resolver.last_cached_at(&key("E16AN")).await.unwrap().is_none());
        clock.advance(Duration::from_secs(10));
        resolver.resolve(&key("E16AN")).await.unwrap();

        assert_eq!(
            resolver.last_cached_at(&key("E16AN")).await.unwrap(),
            Some(clock.now())
        );
    }
}
