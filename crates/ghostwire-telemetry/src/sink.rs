//! Metric recording interface used by pipeline stages

use crate::metric::Tags;

/// Fire-and-forget metric recording
///
/// Implementations must not block; delivery happens later.
pub trait MetricsSink: Send + Sync {
    fn send_metric(&self, name: &str, value: f64, unit: Option<&str>, tags: Option<Tags>);
}

/// Discards every metric
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn send_metric(&self, _name: &str, _value: f64, _unit: Option<&str>, _tags: Option<Tags>) {}
}
