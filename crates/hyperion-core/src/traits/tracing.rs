use crate::{ResolverMetrics, ResolverOperation, UpstreamError};
use std::time::Duration;
use ::tracing::{debug, trace, warn};

/// Metrics adapter that logs resolver events via `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingMetrics {
    /// Service name/prefix (optional)
    service_name: Option<String>,
}

impl TracingMetrics {
    /// Create new tracing metrics adapter
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with service name prefix
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }
}

impl ResolverMetrics for TracingMetrics {
    fn record_hit(&self, upstream: &str, key: &str) {
        debug!(
            target: "hyperion",
            event = "hit",
            upstream = %upstream,
            key = %key,
            service = ?self.service_name,
            "Store hit"
        );
    }

    fn record_miss(&self, upstream: &str, key: &str) {
        debug!(
            target: "hyperion",
            event = "miss",
            upstream = %upstream,
            key = %key,
            service = ?self.service_name,
            "Store miss, going upstream"
        );
    }

    fn record_not_found(&self, upstream: &str, key: &str) {
        debug!(
            target: "hyperion",
            event = "not_found",
            upstream = %upstream,
            key = %key,
            service = ?self.service_name,
            "Upstream has no entity"
        );
    }

    fn record_fetch_failure(&self, upstream: &str, error: &UpstreamError) {
        warn!(
            target: "hyperion",
            event = "fetch_failure",
            upstream = %upstream,
            error = %error,
            service = ?self.service_name,
            "Upstream fetch failed"
        );
    }

    fn record_rejected(&self, upstream: &str) {
        debug!(
            target: "hyperion",
            event = "rejected",
            upstream = %upstream,
            service = ?self.service_name,
            "Circuit open, call rejected"
        );
    }

    fn record_latency(&self, upstream: &str, operation: ResolverOperation, duration: Duration) {
        trace!(
            target: "hyperion",
            event = "latency",
            upstream = %upstream,
            operation = operation.as_str(),
            duration_ms = duration.as_millis() as u64,
            service = ?self.service_name,
            "Resolver operation latency"
        );
    }
}
