//! Periodic refresh of a cached key

use std::sync::Arc;
use std::time::Duration;

use hyperion_core::{CachingError, Clock, Entity, Fetcher, NoopMetrics, ResolverMetrics, Store, SystemClock};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::resolver::CacheAsideResolver;

/// Configuration for a background refresher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Minimum age before a key is refreshed, and the pause between cycles
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl RefreshConfig {
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }
}

/// What one refresh cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshCycle {
    /// The cached value is younger than the interval
    Skipped,
    /// The upstream was asked and the store updated
    Refreshed,
    /// The refresh failed; the cache was left as it was
    Failed(CachingError),
}

/// Keeps one key fresh by re-fetching it once it is `interval` old
///
/// Failures, an open breaker included, are logged and swallowed: callers
/// keep being served whatever the store already holds.
pub struct BackgroundRefresher<E, S, F, M = NoopMetrics>
where
    E: Entity,
{
    resolver: CacheAsideResolver<E, S, F, M>,
    key: E::Key,
    config: RefreshConfig,
    clock: Arc<dyn Clock>,
}

impl<E, S, F, M> BackgroundRefresher<E, S, F, M>
where
    E: Entity,
    S: Store<E>,
    F: Fetcher<E>,
    M: ResolverMetrics,
{
    pub fn new(resolver: CacheAsideResolver<E, S, F, M>, key: E::Key, config: RefreshConfig) -> Self {
        Self {
            resolver,
            key,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Judge staleness with a specific clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn key(&self) -> &E::Key {
        &self.key
    }

    /// Run a single cycle
    pub async fn run_once(&self) -> RefreshCycle {
        let upstream = self.resolver.upstream();

        let last = match self.resolver.last_cached_at(&self.key).await {
            Ok(last) => last,
            Err(e) => {
                tracing::warn!(target: "hyperion", upstream, key = ?self.key, error = %e, "Refresh skipped, store unreadable");
                return RefreshCycle::Failed(e);
            }
        };

        if let Some(at) = last {
            let age = (self.clock.now() - at).to_std().unwrap_or_default();
            if age < self.config.interval {
                tracing::trace!(target: "hyperion", upstream, key = ?self.key, age_secs = age.as_secs(), "Still fresh");
                return RefreshCycle::Skipped;
            }
        }

        match self.resolver.force_refresh(&self.key).await {
            Ok(_) => {
                tracing::info!(target: "hyperion", upstream, key = ?self.key, "Refreshed");
                RefreshCycle::Refreshed
            }
            Err(e) => {
                tracing::warn!(target: "hyperion", upstream, key = ?self.key, error = %e, "Refresh failed");
                RefreshCycle::Failed(e)
            }
        }
    }

    /// Cycle until `cancel` fires
    ///
    /// Cancelling mid-cycle stops waiting for the refresh, but the fetch and
    /// its write run to completion on their own task.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::debug!(
            target: "hyperion",
            upstream = self.resolver.upstream(),
            key = ?self.key,
            interval_secs = self.config.interval.as_secs(),
            "Refresher started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.run_once() => {}
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        tracing::debug!(target: "hyperion", upstream = self.resolver.upstream(), key = ?self.key, "Refresher stopped");
    }

    /// Run on a spawned task
    pub fn spawn(self) -> RefreshHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        RefreshHandle { cancel, task }
    }
}

/// Handle to a spawned refresher
pub struct RefreshHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stop after the current step
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and wait for the task to end
    pub async fn join(self) -> Result<(), JoinError> {
        self.cancel.cancel();
        self.task.await
    }
}
