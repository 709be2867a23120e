//! Proximity search over geo-tagged records
//!
//! A query first asks the store for everything inside a box that
//! circumscribes the search circle, then keeps the records whose exact
//! ellipsoidal distance is below the radius.

pub mod geodesy;
mod index;

pub use index::{GeoError, GeoIndex, Nearby, bounding_boxes};
