//! Location keys, coordinates and resolved postcodes

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

use crate::KeyError;

/// Outward code plus inward code, applied to the normalized form (no spaces,
/// upper case). `GIR0AA` is the one non-geographic exception.
static POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(GIR0AA|(([A-Z][0-9]{1,2})|([A-Z][A-HJ-Y][0-9]{1,2})|([A-Z][0-9][A-Z])|([A-Z][A-HJ-Y][0-9]?[A-Z]))[0-9][A-Z]{2})$",
    )
    .expect("postcode pattern is valid")
});

/// Normalized identifier for a place
///
/// Whitespace is stripped and letters are upper-cased, so `"sw1a 1aa"` and
/// `"SW1A1AA"` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocationKey(String);

impl LocationKey {
    /// Normalize any place identifier
    pub fn new(raw: impl AsRef<str>) -> Result<Self, KeyError> {
        let normalized: String = raw
            .as_ref()
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect();

        if normalized.is_empty() {
            return Err(KeyError::Empty);
        }
        Ok(Self(normalized))
    }

    /// Normalize and validate a UK postcode
    pub fn postcode(raw: impl AsRef<str>) -> Result<Self, KeyError> {
        let key = Self::new(raw.as_ref())?;
        if is_uk_postcode(&key.0) {
            Ok(key)
        } else {
            Err(KeyError::InvalidPostcode(raw.as_ref().to_string()))
        }
    }

    /// The normalized value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Whether `raw` is a well-formed UK postcode (spacing and case are ignored)
pub fn is_uk_postcode(raw: &str) -> bool {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();
    POSTCODE.is_match(&normalized)
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LocationKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LocationKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LocationKey> for String {
    fn from(key: LocationKey) -> Self {
        key.0
    }
}

/// A WGS-84 position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Round both components to six decimal places (about 0.1 m), the
    /// precision upstream positions are stored at.
    pub fn rounded(self) -> Self {
        let round = |v: f64| (v * 1e6).round() / 1e6;
        Self::new(round(self.latitude), round(self.longitude))
    }

    /// Finite and within [-90, 90] x [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// A postcode resolved to a position plus descriptive attributes
///
/// Built once from a successful fetch and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub key: LocationKey,
    pub coordinates: Coordinates,
    pub country: String,
    pub district: String,
    /// Middle-layer super output area
    pub zone: String,
}

impl ResolvedLocation {
    pub fn new(key: LocationKey, coordinates: Coordinates) -> Self {
        Self {
            key,
            coordinates: coordinates.rounded(),
            country: String::new(),
            district: String::new(),
            zone: String::new(),
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    pub fn with_district(mut self, district: impl Into<String>) -> Self {
        self.district = district.into();
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = zone.into();
        self
    }
}

/// A location key paired with the position it resolved to
///
/// Equality and hashing use the key alone; the position rides along so a
/// fetcher keyed by place can query by coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceKey {
    pub key: LocationKey,
    pub coordinates: Coordinates,
}

impl PlaceKey {
    pub fn new(key: LocationKey, coordinates: Coordinates) -> Self {
        Self { key, coordinates }
    }
}

impl From<&ResolvedLocation> for PlaceKey {
    fn from(location: &ResolvedLocation) -> Self {
        Self::new(location.key.clone(), location.coordinates)
    }
}

impl PartialEq for PlaceKey {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PlaceKey {}

impl Hash for PlaceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for PlaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key.fmt(f)
    }
}
