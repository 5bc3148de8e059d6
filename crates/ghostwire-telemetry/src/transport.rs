//! Batch delivery to a metrics backend

use crate::error::TelemetryError;
use crate::metric::Metric;
use async_trait::async_trait;
use tracing::info;

/// Delivers one batch of metrics
///
/// Must tolerate receiving the same batch again after a failed flush;
/// metric ids stay stable across retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricsTransport: Send + Sync {
    async fn send_batch(&self, batch: &[Metric]) -> Result<(), TelemetryError>;
}

/// Writes each metric as a structured log event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTransport;

#[async_trait]
impl MetricsTransport for TracingTransport {
    async fn send_batch(&self, batch: &[Metric]) -> Result<(), TelemetryError> {
        for metric in batch {
            info!(
                target: "ghostwire::metrics",
                id = %metric.id,
                name = %metric.name,
                value = metric.value,
                unit = metric.unit.as_deref().unwrap_or(""),
                tags = ?metric.tags,
                "metric"
            );
        }
        Ok(())
    }
}
