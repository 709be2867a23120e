//! Street-level crime reports

use serde::{Deserialize, Serialize};

use super::location::{Coordinates, LocationKey, PlaceKey};

/// One crime reported near a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetCrime {
    pub id: u64,
    /// Upstream category, e.g. `burglary`
    pub category: String,
    /// `YYYY-MM`
    pub month: String,
    pub street_name: Option<String>,
    /// Anonymised position, snapped to the street
    pub coordinates: Option<Coordinates>,
    pub outcome: Option<String>,
}

impl StreetCrime {
    pub fn new(id: u64, category: impl Into<String>, month: impl Into<String>) -> Self {
        Self {
            id,
            category: category.into(),
            month: month.into(),
            street_name: None,
            coordinates: None,
            outcome: None,
        }
    }

    pub fn with_street(mut self, street_name: impl Into<String>, coordinates: Coordinates) -> Self {
        self.street_name = Some(street_name.into());
        self.coordinates = Some(coordinates.rounded());
        self
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }
}

/// Crimes reported around a postcode
///
/// An empty list is a valid answer: the area had no reported crime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrimeReport {
    pub postcode: LocationKey,
    /// Position the upstream was queried with
    pub position: Coordinates,
    pub crimes: Vec<StreetCrime>,
}

impl CrimeReport {
    pub fn new(place: &PlaceKey, crimes: Vec<StreetCrime>) -> Self {
        Self {
            postcode: place.key.clone(),
            position: place.coordinates,
            crimes,
        }
    }

    pub fn place(&self) -> PlaceKey {
        PlaceKey::new(self.postcode.clone(), self.position)
    }

    /// Number of crimes in `category`
    pub fn count(&self, category: &str) -> usize {
        self.crimes.iter().filter(|c| c.category == category).count()
    }
}
