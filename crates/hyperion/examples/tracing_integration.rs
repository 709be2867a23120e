use async_trait::async_trait;
use hyperion::prelude::*;
use hyperion::TracingMetrics;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Knows one postcode and fails for anything in the EC area
struct Postcodes;

#[async_trait]
impl Fetcher<ResolvedLocation> for Postcodes {
    async fn fetch(
        &self,
        key: &LocationKey,
    ) -> std::result::Result<FetchOutcome<ResolvedLocation>, UpstreamError> {
        match key.as_str() {
            "SW1A1AA" => Ok(FetchOutcome::Found(ResolvedLocation::new(
                key.clone(),
                Coordinates::new(51.501009, -0.141588),
            ))),
            k if k.starts_with("EC") => Err(UpstreamError::Timeout),
            _ => Ok(FetchOutcome::NotFound),
        }
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let resolver = CacheAsideResolver::new(
        MemoryStore::with_defaults(),
        Postcodes,
        ResolverConfig::new("postcodes").with_breaker(BreakerConfig::default().with_fail_max(2)),
    )
    .with_metrics(TracingMetrics::new().with_service_name("example-service"));

    println!("\nResolving SW1A 1AA (miss, then hit)...");
    let key = LocationKey::postcode("SW1A 1AA")?;
    resolver.resolve(&key).await?;
    resolver.resolve(&key).await?;

    println!("\nResolving an unknown postcode...");
    let missing = resolver.resolve(&LocationKey::postcode("M1 1AE")?).await?;
    println!("   Found: {}", missing.is_found());

    println!("\nTripping the breaker...");
    let failing = LocationKey::postcode("EC1A 1BB")?;
    for _ in 0..3 {
        if let Err(e) = resolver.resolve(&failing).await {
            println!("   {e}");
        }
    }
    println!("   Breaker is now {}", resolver.breaker().state());

    println!("\nCheck your console output for structured logs!");

    Ok(())
}
