//! Upstream fetcher trait

use async_trait::async_trait;

use super::store::Entity;
use crate::{FetchOutcome, UpstreamError};

/// Loads an entity from an upstream provider
///
/// Implementations own the wire format. They report "no such entity" as
/// [`FetchOutcome::NotFound`] and reserve `Err` for real failures, which the
/// circuit breaker counts.
#[async_trait]
pub trait Fetcher<E: Entity>: Send + Sync + 'static {
    /// Fetch the entity for `key`
    async fn fetch(&self, key: &E::Key) -> Result<FetchOutcome<E>, UpstreamError>;
}

#[async_trait]
impl<E, F> Fetcher<E> for std::sync::Arc<F>
where
    E: Entity,
    F: Fetcher<E> + ?Sized,
{
    async fn fetch(&self, key: &E::Key) -> Result<FetchOutcome<E>, UpstreamError> {
        (**self).fetch(key).await
    }
}
