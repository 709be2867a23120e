use async_trait::async_trait;
use hyperion::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// A slow postcode lookup that counts how often it is called
#[derive(Default)]
struct SlowPostcodes {
    calls: AtomicUsize,
}

#[async_trait]
impl Fetcher<ResolvedLocation> for SlowPostcodes {
    async fn fetch(
        &self,
        key: &LocationKey,
    ) -> std::result::Result<FetchOutcome<ResolvedLocation>, UpstreamError> {
        let count = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        println!("Fetching {key} upstream... (count: {count})");
        sleep(Duration::from_millis(100)).await;

        let location = ResolvedLocation::new(key.clone(), Coordinates::new(51.501009, -0.141588))
            .with_country("England")
            .with_district("Westminster");
        Ok(FetchOutcome::Found(location))
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let upstream = Arc::new(SlowPostcodes::default());
    let resolver = CacheAsideResolver::new(
        MemoryStore::with_defaults(),
        Arc::clone(&upstream),
        ResolverConfig::new("postcodes").with_breaker(BreakerConfig::postcodes()),
    );
    let key = LocationKey::postcode("SW1A 1AA")?;

    println!("Spawning 10 concurrent resolves for {key}...");

    let mut handles = Vec::new();
    for _ in 0..10 {
        let resolver = resolver.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move { resolver.resolve(&key).await }));
    }

    for h in handles {
        let location = h.await??.value().ok_or("postcode should exist")?;
        assert_eq!(location.district, "Westminster");
    }

    let total = upstream.calls.load(Ordering::SeqCst);
    println!("Upstream calls performed: {total}");

    if total != 1 {
        panic!("Coalescing failed! Expected 1 upstream call, got {total}");
    }

    let again = resolver.resolve(&key).await?;
    println!("Follow-up resolve served from cache: {}", again.is_cached());

    Ok(())
}
