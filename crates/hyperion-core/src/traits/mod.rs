//! Collaborator traits consumed by the core

mod clock;
mod fetcher;
mod key;
mod metrics;
mod store;

#[cfg(feature = "tracing")]
mod tracing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use fetcher::Fetcher;
pub use key::CacheKey;
pub use metrics::{NoopMetrics, ResolverMetrics, ResolverOperation};
pub use store::{Entity, GeoStore, Store};

#[cfg(feature = "metrics")]
pub use metrics::MetricsCrateAdapter;

#[cfg(feature = "tracing")]
pub use self::tracing::TracingMetrics;
