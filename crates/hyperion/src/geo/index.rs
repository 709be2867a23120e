//! Proximity queries over a geo store

use std::f64::consts::FRAC_PI_2;
use std::marker::PhantomData;

use hyperion_core::{BoundingBox, Coordinates, DatasetId, GeoStore, GeoTaggedRecord, StoreError};

use super::geodesy;

/// Absolute latitude pad in degrees (about 0.1 m)
const LAT_PAD_DEG: f64 = 1e-6;
/// Relative longitude pad over the spherical tangent bound
const LON_PAD: f64 = 1.01;

/// Error from a proximity query
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    /// Center outside [-90, 90] x [-180, 180] or not finite
    #[error("invalid coordinates: {latitude},{longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A record within the query radius
#[derive(Debug, Clone, PartialEq)]
pub struct Nearby<R> {
    pub record: GeoTaggedRecord<R>,
    /// Ellipsoidal distance from the query center
    pub distance_km: f64,
}

impl<R> Nearby<R> {
    /// Distance rounded down to whole metres
    pub fn distance_m(&self) -> u64 {
        (self.distance_km * 1000.0).floor() as u64
    }
}

/// Boxes that together contain every point closer than `radius_km`
///
/// Usually one box. Two when the circle crosses the antimeridian, and a
/// single all-longitude box when it reaches a pole.
pub fn bounding_boxes(center: &Coordinates, radius_km: f64) -> Vec<BoundingBox> {
    let reaches_north =
        geodesy::distance_km(center, &Coordinates::new(90.0, center.longitude)) <= radius_km;
    let reaches_south =
        geodesy::distance_km(center, &Coordinates::new(-90.0, center.longitude)) <= radius_km;

    let lat_max = if reaches_north {
        90.0
    } else {
        (geodesy::destination(center, 0.0, radius_km).latitude + LAT_PAD_DEG).min(90.0)
    };
    let lat_min = if reaches_south {
        -90.0
    } else {
        (geodesy::destination(center, 180.0, radius_km).latitude - LAT_PAD_DEG).max(-90.0)
    };

    if reaches_north || reaches_south {
        return vec![BoundingBox::new(lat_min, lat_max, -180.0, 180.0)];
    }

    let half_width = longitude_half_width(center, radius_km);
    if half_width >= 180.0 {
        return vec![BoundingBox::new(lat_min, lat_max, -180.0, 180.0)];
    }

    let lon_min = center.longitude - half_width;
    let lon_max = center.longitude + half_width;
    if lon_min < -180.0 {
        vec![
            BoundingBox::new(lat_min, lat_max, lon_min + 360.0, 180.0),
            BoundingBox::new(lat_min, lat_max, -180.0, lon_max),
        ]
    } else if lon_max > 180.0 {
        vec![
            BoundingBox::new(lat_min, lat_max, lon_min, 180.0),
            BoundingBox::new(lat_min, lat_max, -180.0, lon_max - 360.0),
        ]
    } else {
        vec![BoundingBox::new(lat_min, lat_max, lon_min, lon_max)]
    }
}

/// Longitude reach of the circle in degrees
///
/// The points due east and west are not the widest part of the circle away
/// from the equator, so the half-width is at least the spherical tangent
/// bound taken on the polar radius.
fn longitude_half_width(center: &Coordinates, radius_km: f64) -> f64 {
    let east = geodesy::destination(center, 90.0, radius_km).longitude;
    let west = geodesy::destination(center, 270.0, radius_km).longitude;
    let direct = geodesy::normalize_longitude(east - center.longitude)
        .abs()
        .max(geodesy::normalize_longitude(center.longitude - west).abs());

    let angular = radius_km / geodesy::POLAR_RADIUS_KM;
    let ratio = angular.sin() / center.latitude.to_radians().cos();
    if angular >= FRAC_PI_2 || !(0.0..1.0).contains(&ratio) {
        return 180.0;
    }

    direct.max(ratio.asin().to_degrees()) * LON_PAD
}

/// Radius search over one dataset of a [`GeoStore`]
pub struct GeoIndex<R, S> {
    store: S,
    dataset: DatasetId,
    _payload: PhantomData<fn() -> R>,
}

impl<R, S> GeoIndex<R, S>
where
    R: Clone + Send + Sync + 'static,
    S: GeoStore<R>,
{
    pub fn new(store: S, dataset: impl Into<DatasetId>) -> Self {
        Self {
            store,
            dataset: dataset.into(),
            _payload: PhantomData,
        }
    }

    pub fn dataset(&self) -> &DatasetId {
        &self.dataset
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Records strictly closer than `radius_km` to `center`, nearest first
    ///
    /// A radius that is not a positive finite number matches nothing.
    pub async fn within(
        &self,
        center: Coordinates,
        radius_km: f64,
    ) -> Result<Vec<Nearby<R>>, GeoError> {
        if !center.is_valid() {
            return Err(GeoError::InvalidCoordinates {
                latitude: center.latitude,
                longitude: center.longitude,
            });
        }
        if !(radius_km.is_finite() && radius_km > 0.0) {
            return Ok(Vec::new());
        }

        let mut nearby = Vec::new();
        let mut candidates = 0usize;
        for bbox in bounding_boxes(&center, radius_km) {
            let records = self.store.query_bounding_box(&self.dataset, &bbox).await?;
            candidates += records.len();

            for record in records {
                let distance_km = geodesy::distance_km(&center, &record.coordinates);
                if distance_km < radius_km {
                    nearby.push(Nearby {
                        record,
                        distance_km,
                    });
                }
            }
        }

        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

        tracing::trace!(
            target: "hyperion",
            dataset = %self.dataset,
            center = %center,
            radius_km,
            candidates,
            matched = nearby.len(),
            "Proximity query"
        );

        Ok(nearby)
    }
}
