//! Police neighbourhood records

use serde::{Deserialize, Serialize};

use super::location::{Coordinates, LocationKey, PlaceKey};

/// Ways of contacting a neighbourhood team; any of them may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub email: Option<String>,
    pub facebook: Option<String>,
    pub telephone: Option<String>,
    pub twitter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub url: String,
}

/// A police station or other point of contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoliceLocation {
    pub name: String,
    pub address: String,
    pub description: Option<String>,
    /// Upstream category, e.g. `station`
    pub kind: String,
    pub coordinates: Option<Coordinates>,
}

/// The policing neighbourhood covering a postcode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbourhood {
    /// Postcode this record was resolved for
    pub postcode: LocationKey,
    /// Position the upstream was queried with
    pub position: Coordinates,
    /// Force-local neighbourhood code
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub contact: Contact,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub locations: Vec<PoliceLocation>,
}

impl Neighbourhood {
    pub fn new(place: &PlaceKey, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            postcode: place.key.clone(),
            position: place.coordinates,
            code: code.into(),
            name: name.into(),
            description: None,
            contact: Contact::default(),
            links: Vec::new(),
            locations: Vec::new(),
        }
    }

    pub fn place(&self) -> PlaceKey {
        PlaceKey::new(self.postcode.clone(), self.position)
    }
}
