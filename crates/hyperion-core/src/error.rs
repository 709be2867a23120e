//! Error types for the data-access core
//!
//! Every error here is `Clone` so a single outcome can be handed to every
//! caller that coalesced onto the same in-flight fetch.

use thiserror::Error;

/// A fetch against an upstream provider failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// Could not reach the provider
    #[error("could not connect to {0}")]
    Connection(String),

    /// The provider answered with something we could not decode
    #[error("could not decode data: {0}")]
    Decode(String),

    /// The provider answered with an unexpected status
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    /// The provider did not answer in time
    #[error("upstream timed out")]
    Timeout,
}

impl UpstreamError {
    /// Whether this error should count against the upstream's circuit breaker.
    ///
    /// Every variant does today; the hook exists so a provider-specific
    /// classification can be slotted in without touching the breaker.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            UpstreamError::Connection(_)
                | UpstreamError::Decode(_)
                | UpstreamError::Status { .. }
                | UpstreamError::Timeout
        )
    }
}

/// A persistence operation failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend operation failed
    #[error("backend error: {0}")]
    Backend(String),

    /// Snapshot could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Snapshot file could not be read or written
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// A location key could not be built from caller input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Nothing left after normalization
    #[error("location key is empty")]
    Empty,

    /// Not a well-formed UK postcode
    #[error("invalid postcode: {0}")]
    InvalidPostcode(String),
}

/// Resolver-level error: nothing cached and no successful fetch
///
/// This is the translation boundary. Breaker and coalescer errors are turned
/// into one of these variants by the resolver and nowhere else.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CachingError {
    /// The upstream's circuit is open; no call was attempted
    #[error("{key} is not cached and {upstream} is unavailable (circuit open)")]
    BreakerOpen { upstream: String, key: String },

    /// The upstream was called and failed
    #[error("{key} is not cached and {upstream} failed: {source}")]
    Upstream {
        upstream: String,
        key: String,
        #[source]
        source: UpstreamError,
    },

    /// The store failed while reading or persisting
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The in-flight call for this key ended without producing an outcome
    #[error("in-flight request for {key} was abandoned")]
    Abandoned { key: String },
}

impl CachingError {
    /// Whether the caller should treat this as "temporarily unavailable"
    /// rather than as a broken upstream.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CachingError::BreakerOpen { .. })
    }

    /// The upstream involved, when there is one
    pub fn upstream(&self) -> Option<&str> {
        match self {
            CachingError::BreakerOpen { upstream, .. } | CachingError::Upstream { upstream, .. } => {
                Some(upstream)
            }
            _ => None,
        }
    }
}

/// Result type alias for resolver operations
pub type Result<T> = std::result::Result<T, CachingError>;
