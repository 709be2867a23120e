//! Points of interest near a place

use serde::{Deserialize, Serialize};
use std::fmt;

use super::location::{Coordinates, LocationKey, PlaceKey};

/// A request for the points of interest around a place
///
/// Two queries for the same postcode with different limits are different
/// keys, since each is answered and cached separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NearbyQuery {
    pub place: PlaceKey,
    pub limit: u32,
}

impl NearbyQuery {
    /// Search radius upstreams are asked to use, in metres
    pub const RADIUS_M: u32 = 10_000;

    pub fn new(place: PlaceKey, limit: u32) -> Self {
        Self { place, limit }
    }
}

impl fmt::Display for NearbyQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.place, self.limit)
    }
}

/// An article or landmark reported by a geosearch upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub page_id: u64,
    pub title: String,
    pub coordinates: Coordinates,
    /// Distance from the queried position as reported upstream
    pub distance_m: f64,
}

impl PointOfInterest {
    pub fn new(page_id: u64, title: impl Into<String>, coordinates: Coordinates, distance_m: f64) -> Self {
        Self {
            page_id,
            title: title.into(),
            coordinates: coordinates.rounded(),
            distance_m,
        }
    }
}

/// Points of interest around a postcode, nearest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyPlaces {
    pub postcode: LocationKey,
    /// Position the upstream was queried with
    pub position: Coordinates,
    pub limit: u32,
    pub places: Vec<PointOfInterest>,
}

impl NearbyPlaces {
    /// Keeps at most `query.limit` places, ordered by distance
    pub fn new(query: &NearbyQuery, mut places: Vec<PointOfInterest>) -> Self {
        places.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        places.truncate(query.limit as usize);
        Self {
            postcode: query.place.key.clone(),
            position: query.place.coordinates,
            limit: query.limit,
            places,
        }
    }

    pub fn query(&self) -> NearbyQuery {
        NearbyQuery::new(PlaceKey::new(self.postcode.clone(), self.position), self.limit)
    }
}
