//! Cache key trait and implementations

use std::fmt::Debug;
use std::hash::Hash;

use crate::{DatasetId, LocationKey, NearbyQuery, PlaceKey};

/// Trait for types that can key a cached entity
///
/// The string form is used for log fields, metric labels and error messages;
/// maps are keyed by the value itself.
pub trait CacheKey: Debug + Clone + Eq + Hash + Send + Sync + 'static {
    /// Generate the key string
    fn cache_key(&self) -> String;

    /// Optional namespace for the key
    fn namespace(&self) -> Option<&str> {
        None
    }

    /// Get the full key including namespace
    fn full_key(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}:{}", ns, self.cache_key()),
            None => self.cache_key(),
        }
    }
}

impl CacheKey for String {
    fn cache_key(&self) -> String {
        self.clone()
    }
}

impl CacheKey for LocationKey {
    fn cache_key(&self) -> String {
        self.as_str().to_string()
    }
}

impl CacheKey for PlaceKey {
    fn cache_key(&self) -> String {
        self.key.as_str().to_string()
    }
}

impl CacheKey for NearbyQuery {
    fn cache_key(&self) -> String {
        self.to_string()
    }

    fn namespace(&self) -> Option<&str> {
        Some("nearby")
    }
}

impl CacheKey for DatasetId {
    fn cache_key(&self) -> String {
        self.as_str().to_string()
    }

    fn namespace(&self) -> Option<&str> {
        Some("dataset")
    }
}
