//! Metrics trait for resolver observability

use std::time::Duration;

use crate::UpstreamError;

/// Resolver operation for latency tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverOperation {
    /// Store lookup
    Lookup,
    /// Upstream fetch, including breaker and coalescing waits
    Fetch,
    /// Store write after a successful fetch
    Persist,
    /// Forced refresh
    Refresh,
}

impl ResolverOperation {
    /// Get operation as string label
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolverOperation::Lookup => "lookup",
            ResolverOperation::Fetch => "fetch",
            ResolverOperation::Persist => "persist",
            ResolverOperation::Refresh => "refresh",
        }
    }
}

/// Trait for resolver metrics/observability
///
/// Implement this to integrate with your metrics system (Prometheus, StatsD, etc.)
pub trait ResolverMetrics: Send + Sync + 'static {
    /// A resolve was answered from the store
    fn record_hit(&self, upstream: &str, key: &str);

    /// A resolve had to go upstream
    fn record_miss(&self, upstream: &str, key: &str);

    /// The upstream reported no entity for the key
    fn record_not_found(&self, upstream: &str, key: &str);

    /// The upstream call failed
    fn record_fetch_failure(&self, upstream: &str, error: &UpstreamError);

    /// The breaker rejected the call without contacting the upstream
    fn record_rejected(&self, upstream: &str);

    /// Record operation latency
    fn record_latency(&self, upstream: &str, operation: ResolverOperation, duration: Duration);
}

/// No-op metrics implementation (default)
///
/// Zero overhead when metrics are not needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl ResolverMetrics for NoopMetrics {
    #[inline]
    fn record_hit(&self, _upstream: &str, _key: &str) {}

    #[inline]
    fn record_miss(&self, _upstream: &str, _key: &str) {}

    #[inline]
    fn record_not_found(&self, _upstream: &str, _key: &str) {}

    #[inline]
    fn record_fetch_failure(&self, _upstream: &str, _error: &UpstreamError) {}

    #[inline]
    fn record_rejected(&self, _upstream: &str) {}

    #[inline]
    fn record_latency(&self, _upstream: &str, _operation: ResolverOperation, _duration: Duration) {}
}

/// Metrics adapter using the `metrics` crate
///
/// # Example
/// ```ignore
/// use hyperion_core::MetricsCrateAdapter;
///
/// // Set up a metrics recorder (e.g., prometheus_exporter)
/// // metrics::set_global_recorder(recorder);
///
/// let metrics = MetricsCrateAdapter::new("hyperion");
/// // Emits: hyperion_hits_total, hyperion_misses_total, etc.
/// ```
#[cfg(feature = "metrics")]
#[derive(Debug, Clone)]
pub struct MetricsCrateAdapter {
    prefix: String,
}

#[cfg(feature = "metrics")]
impl MetricsCrateAdapter {
    /// Create a new adapter with the given metric name prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn metric_name(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }
}

#[cfg(feature = "metrics")]
impl ResolverMetrics for MetricsCrateAdapter {
    fn record_hit(&self, upstream: &str, _key: &str) {
        metrics::counter!(self.metric_name("hits_total"), "upstream" => upstream.to_string())
            .increment(1);
    }

    fn record_miss(&self, upstream: &str, _key: &str) {
        metrics::counter!(self.metric_name("misses_total"), "upstream" => upstream.to_string())
            .increment(1);
    }

    fn record_not_found(&self, upstream: &str, _key: &str) {
        metrics::counter!(self.metric_name("not_found_total"), "upstream" => upstream.to_string())
            .increment(1);
    }

    fn record_fetch_failure(&self, upstream: &str, _error: &UpstreamError) {
        metrics::counter!(
            self.metric_name("fetch_failures_total"),
            "upstream" => upstream.to_string()
        )
        .increment(1);
    }

    fn record_rejected(&self, upstream: &str) {
        metrics::counter!(
            self.metric_name("breaker_rejections_total"),
            "upstream" => upstream.to_string()
        )
        .increment(1);
    }

    fn record_latency(&self, upstream: &str, operation: ResolverOperation, duration: Duration) {
        metrics::histogram!(
            self.metric_name("operation_duration_seconds"),
            "upstream" => upstream.to_string(),
            "operation" => operation.as_str()
        )
        .record(duration.as_secs_f64());
    }
}
