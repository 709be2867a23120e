use async_trait::async_trait;
use hyperion::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A register that publishes one new report every time it is asked
#[derive(Default)]
struct GrowingRegister {
    next: AtomicU64,
}

#[async_trait]
impl Fetcher<FeedBatch<StolenBike>> for GrowingRegister {
    async fn fetch(
        &self,
        key: &DatasetId,
    ) -> std::result::Result<FetchOutcome<FeedBatch<StolenBike>>, UpstreamError> {
        let newest = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        let items = (1..=newest)
            .map(|id| {
                let position = Coordinates::new(51.5 + id as f64 * 0.001, -0.12);
                FeedItem::new(id, Some(position), StolenBike::default())
            })
            .collect();
        Ok(FetchOutcome::Found(FeedBatch::new(key.clone(), items)))
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dataset = DatasetId::new("stolen-bikes");
    let store = MemoryFeedStore::with_defaults();
    let resolver = CacheAsideResolver::new(
        store.clone(),
        GrowingRegister::default(),
        ResolverConfig::new("bike-register").with_breaker(BreakerConfig::bike_register()),
    );

    let handle = BackgroundRefresher::new(
        resolver,
        dataset.clone(),
        RefreshConfig::with_interval(Duration::from_millis(200)),
    )
    .spawn();

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(210)).await;
        println!("{} record(s) stored", store.len(&dataset));
    }

    handle.join().await?;
    println!("Refresher stopped with {} record(s)", store.len(&dataset));

    let index = GeoIndex::new(Arc::new(store), dataset);
    let nearby = index.within(Coordinates::new(51.5, -0.12), 0.5).await?;
    println!("{} within 500 m", nearby.len());

    Ok(())
}
