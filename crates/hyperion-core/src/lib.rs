//! hyperion-core: Core traits and types for the hyperion data-access layer
//!
//! This crate holds the error taxonomy, the collaborator contracts the core
//! consumes ([`Fetcher`], [`Store`], [`GeoStore`], [`Clock`]) and the data
//! model shared by the storage and resolver crates.

mod error;
mod traits;
mod types;

pub use error::{CachingError, KeyError, Result, StoreError, UpstreamError};
pub use traits::*;
pub use types::*;
