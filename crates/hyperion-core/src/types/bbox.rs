//! Axis-aligned latitude/longitude rectangles

use serde::{Deserialize, Serialize};

use super::location::Coordinates;

/// Inclusive rectangle in degrees; never wraps the antimeridian
/// (`lon_min <= lon_max`). Callers split wrapping boxes in two.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    /// The whole globe
    pub fn world() -> Self {
        Self::new(-90.0, 90.0, -180.0, 180.0)
    }

    pub fn contains(&self, point: &Coordinates) -> bool {
        (self.lat_min..=self.lat_max).contains(&point.latitude)
            && (self.lon_min..=self.lon_max).contains(&point.longitude)
    }

    pub fn is_empty(&self) -> bool {
        self.lat_min > self.lat_max || self.lon_min > self.lon_max
    }
}
