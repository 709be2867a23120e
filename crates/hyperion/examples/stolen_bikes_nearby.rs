use async_trait::async_trait;
use hyperion::prelude::*;
use hyperion::service::{self, STOLEN_BIKES};
use hyperion::{Neighbourhood, PlaceKey, Resolvers};

struct Postcodes;

#[async_trait]
impl Fetcher<ResolvedLocation> for Postcodes {
    async fn fetch(
        &self,
        key: &LocationKey,
    ) -> std::result::Result<FetchOutcome<ResolvedLocation>, UpstreamError> {
        Ok(match key.as_str() {
            "M11AE" => FetchOutcome::Found(
                ResolvedLocation::new(key.clone(), Coordinates::new(53.4808, -2.2426))
                    .with_country("England")
                    .with_district("Manchester"),
            ),
            _ => FetchOutcome::NotFound,
        })
    }
}

struct Police;

#[async_trait]
impl Fetcher<Neighbourhood> for Police {
    async fn fetch(
        &self,
        key: &PlaceKey,
    ) -> std::result::Result<FetchOutcome<Neighbourhood>, UpstreamError> {
        Ok(FetchOutcome::Found(Neighbourhood::new(key, "MC01", "City Centre")))
    }
}

#[async_trait]
impl Fetcher<CrimeReport> for Police {
    async fn fetch(
        &self,
        key: &PlaceKey,
    ) -> std::result::Result<FetchOutcome<CrimeReport>, UpstreamError> {
        let crimes = vec![
            StreetCrime::new(1, "bicycle-theft", "2017-01"),
            StreetCrime::new(2, "bicycle-theft", "2017-01"),
            StreetCrime::new(3, "shoplifting", "2017-01"),
        ];
        Ok(FetchOutcome::Found(CrimeReport::new(key, crimes)))
    }
}

struct Wikipedia;

#[async_trait]
impl Fetcher<NearbyPlaces> for Wikipedia {
    async fn fetch(
        &self,
        key: &NearbyQuery,
    ) -> std::result::Result<FetchOutcome<NearbyPlaces>, UpstreamError> {
        let places = vec![
            PointOfInterest::new(1, "Piccadilly Gardens", Coordinates::new(53.4809, -2.2374), 350.0),
            PointOfInterest::new(2, "Manchester Arndale", Coordinates::new(53.4833, -2.2400), 290.0),
        ];
        Ok(FetchOutcome::Found(NearbyPlaces::new(key, places)))
    }
}

/// A register with a handful of reports around Manchester
struct Register;

#[async_trait]
impl Fetcher<FeedBatch<StolenBike>> for Register {
    async fn fetch(
        &self,
        key: &DatasetId,
    ) -> std::result::Result<FetchOutcome<FeedBatch<StolenBike>>, UpstreamError> {
        let reports = [
            (101, 53.4794, -2.2453, "Brompton"),
            (102, 53.4631, -2.2913, "Trek"),
            (103, 53.5500, -2.1000, "Specialized"),
            (104, 53.4084, -2.9916, "Raleigh"),
        ];
        let items = reports
            .into_iter()
            .map(|(id, lat, lon, make)| {
                FeedItem::new(
                    id,
                    Some(Coordinates::new(lat, lon)),
                    StolenBike {
                        make: Some(make.to_string()),
                        ..StolenBike::default()
                    },
                )
            })
            .collect();
        Ok(FetchOutcome::Found(FeedBatch::new(key.clone(), items)))
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let bikes = MemoryFeedStore::with_defaults();

    // Pull the register once so there is something to search
    let register = service::bike_register_resolver(bikes.clone(), Register);
    register.force_refresh(&DatasetId::new(STOLEN_BIKES)).await?;

    let resolvers = Resolvers {
        postcodes: service::postcode_resolver(MemoryStore::with_defaults(), Postcodes),
        neighbourhoods: service::neighbourhood_resolver(MemoryStore::with_defaults(), Police),
        crimes: service::crime_resolver(MemoryStore::with_defaults(), Police),
        places: service::places_resolver(MemoryStore::with_defaults(), Wikipedia),
    };
    let locations = LocationService::new(resolvers, service::bike_index(bikes));

    let neighbourhood = locations.neighbourhood("m1 1ae").await?;
    if let Some(n) = neighbourhood.value() {
        println!("M1 1AE is policed by {} ({})", n.name, n.code);
    }

    if let Some(report) = locations.crime("M1 1AE").await?.value() {
        println!("{} bicycle theft(s) reported nearby", report.count("bicycle-theft"));
    }

    if let Some(nearby) = locations.nearby("M1 1AE", Some(5)).await?.value() {
        for place in &nearby.places {
            println!("   {} ({} m)", place.title, place.distance_m);
        }
    }

    for radius in [1.0, 10.0, 50.0] {
        let found = locations.stolen_bikes("M1 1AE", Some(radius)).await?;
        println!("\nWithin {radius} km: {} bike(s)", found.len());
        for nearby in &found {
            println!(
                "   #{} {:<12} {:>6} m",
                nearby.record.sequence_id,
                nearby.record.payload.make.as_deref().unwrap_or("unknown"),
                nearby.distance_m()
            );
        }
    }

    match locations.stolen_bikes("EC1A 1BB", None).await {
        Ok(_) => println!("\nUnexpected match"),
        Err(e) => println!("\nEC1A 1BB: {e} ({:?})", e.status_class()),
    }

    Ok(())
}
