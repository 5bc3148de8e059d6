//! Client-side metric buffering
//!
//! Metrics accumulate in memory and leave in batches:
//! - on every flush interval tick
//! - as soon as the buffer reaches its limit
//! - on an explicit [`BufferedMetrics::flush`] or shutdown
//!
//! A failed batch goes back to the front of the buffer, ahead of anything
//! recorded while it was in flight. The buffer holds at most
//! [`TelemetryConfig::max_buffered`] metrics; past that the oldest are dropped.

use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::metric::{Metric, Tags};
use crate::sink::MetricsSink;
use crate::transport::MetricsTransport;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Flush counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub recorded: u64,
    pub delivered: u64,
    pub failed_flushes: u64,
    pub dropped: u64,
}

/// Buffered metrics client
pub struct BufferedMetrics {
    config: TelemetryConfig,
    transport: Arc<dyn MetricsTransport>,
    buffer: Mutex<Vec<Metric>>,
    // One batch in flight at a time keeps re-buffering order intact
    flush_lock: tokio::sync::Mutex<()>,
    full: Notify,
    recorded: AtomicU64,
    delivered: AtomicU64,
    failed_flushes: AtomicU64,
    dropped: AtomicU64,
}

impl std::fmt::Debug for BufferedMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedMetrics")
            .field("config", &self.config)
            .field("buffered", &self.buffered())
            .finish_non_exhaustive()
    }
}

impl BufferedMetrics {
    /// Create client
    ///
    /// # Errors
    /// `TelemetryError::InvalidConfig` if the config is out of range.
    pub fn new(
        config: TelemetryConfig,
        transport: Arc<dyn MetricsTransport>,
    ) -> Result<Self, TelemetryError> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            buffer: Mutex::new(Vec::with_capacity(config.buffer_limit)),
            flush_lock: tokio::sync::Mutex::new(()),
            full: Notify::new(),
            recorded: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            failed_flushes: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> TelemetryConfig {
        self.config
    }

    /// Buffer one metric
    pub fn record(&self, metric: Metric) {
        let (before, after) = {
            let mut buffer = self.buffer.lock();
            let before = buffer.len();
            buffer.push(metric);
            self.drop_oldest(&mut buffer);
            (before, buffer.len())
        };
        self.recorded.fetch_add(1, Ordering::Relaxed);

        let limit = self.config.buffer_limit;
        if before < limit && after >= limit {
            debug!(buffered = after, "Metrics buffer full");
            self.full.notify_one();
        }
    }

    fn drop_oldest(&self, buffer: &mut Vec<Metric>) {
        let excess = buffer.len().saturating_sub(self.config.max_buffered());
        if excess > 0 {
            buffer.drain(..excess);
            self.dropped.fetch_add(excess as u64, Ordering::Relaxed);
            warn!(
                dropped = excess,
                max_buffered = self.config.max_buffered(),
                "Metrics buffer over capacity; oldest metrics dropped"
            );
        }
    }

    /// Metrics waiting to be flushed
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Copy of the buffered metrics, oldest first
    #[must_use]
    pub fn pending(&self) -> Vec<Metric> {
        self.buffer.lock().clone()
    }

    #[must_use]
    pub fn stats(&self) -> FlushStats {
        FlushStats {
            recorded: self.recorded.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    /// Send everything buffered as one batch
    ///
    /// Returns the number of metrics delivered. An empty buffer is not sent.
    ///
    /// # Errors
    /// The transport error; the batch is back in the buffer.
    pub async fn flush(&self) -> Result<usize, TelemetryError> {
        let _in_flight = self.flush_lock.lock().await;

        let batch = std::mem::take(&mut *self.buffer.lock());
        if batch.is_empty() {
            return Ok(0);
        }

        match self.transport.send_batch(&batch).await {
            Ok(()) => {
                let sent = batch.len();
                self.delivered.fetch_add(sent as u64, Ordering::Relaxed);
                debug!(sent, "Metrics flushed");
                Ok(sent)
            }
            Err(e) => {
                let size = batch.len();
                {
                    let mut buffer = self.buffer.lock();
                    let newer = std::mem::replace(&mut *buffer, batch);
                    buffer.extend(newer);
                    self.drop_oldest(&mut buffer);
                }
                self.failed_flushes.fetch_add(1, Ordering::Relaxed);
                warn!(batch = size, error = %e, "Metrics flush failed; batch re-buffered");
                Err(e)
            }
        }
    }

    /// Start the periodic flush worker
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn_auto_flush(self: &Arc<Self>) -> AutoFlush {
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(run_auto_flush(Arc::clone(self), Arc::clone(&shutdown)));
        AutoFlush { task, shutdown }
    }
}

impl MetricsSink for BufferedMetrics {
    fn send_metric(&self, name: &str, value: f64, unit: Option<&str>, tags: Option<Tags>) {
        let mut metric = Metric::new(name, value);
        metric.unit = unit.map(str::to_string);
        if let Some(tags) = tags {
            metric.tags = tags;
        }
        self.record(metric);
    }
}

/// Handle to the auto-flush worker
#[derive(Debug)]
pub struct AutoFlush {
    task: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

impl AutoFlush {
    /// Stop the worker after a final flush
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Auto-flush worker ended abnormally");
        }
    }
}

async fn run_auto_flush(metrics: Arc<BufferedMetrics>, shutdown: Arc<Notify>) {
    let mut ticker = tokio::time::interval(metrics.config.flush_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            () = shutdown.notified() => break,
            _ = ticker.tick() => {}
            () = metrics.full.notified() => {}
        }
        if let Err(e) = metrics.flush().await {
            warn!(error = %e, buffered = metrics.buffered(), "Auto-flush failed");
        }
    }

    if let Err(e) = metrics.flush().await {
        warn!(error = %e, buffered = metrics.buffered(), "Final flush failed");
    }
    debug!("Auto-flush worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockMetricsTransport;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn client(transport: MockMetricsTransport, config: TelemetryConfig) -> BufferedMetrics {
        BufferedMetrics::new(config, Arc::new(transport)).unwrap()
    }

    #[tokio::test]
    async fn flush_sends_one_batch_and_empties_buffer() {
        let mut transport = MockMetricsTransport::new();
        transport
            .expect_send_batch()
            .withf(|batch: &[Metric]| batch.len() == 2 && batch[0].name == "a")
            .times(1)
            .returning(|_| Ok(()));

        let metrics = client(transport, TelemetryConfig::default());
        metrics.record(Metric::new("a", 1.0));
        metrics.record(Metric::new("b", 2.0));

        assert_eq!(metrics.flush().await.unwrap(), 2);
        assert_eq!(metrics.buffered(), 0);
        assert_eq!(metrics.stats().delivered, 2);
    }

    #[tokio::test]
    async fn empty_buffer_is_not_sent() {
        let mut transport = MockMetricsTransport::new();
        transport.expect_send_batch().times(0);

        let metrics = client(transport, TelemetryConfig::default());
        assert_eq!(metrics.flush().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_flush_rebuffers_in_order() {
        let mut transport = MockMetricsTransport::new();
        let mut seq = mockall::Sequence::new();
        transport
            .expect_send_batch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(TelemetryError::Transport("503".into())));
        transport
            .expect_send_batch()
            .withf(|batch: &[Metric]| {
                batch.iter().map(|m| m.name.as_str()).collect::<Vec<_>>() == ["a", "b", "c"]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let metrics = client(transport, TelemetryConfig::default());
        metrics.record(Metric::new("a", 1.0));
        metrics.record(Metric::new("b", 1.0));
        let ids: Vec<_> = metrics.pending().iter().map(|m| m.id).collect();

        assert!(metrics.flush().await.is_err());
        assert_eq!(metrics.buffered(), 2);
        assert_eq!(metrics.stats().failed_flushes, 1);
        assert_eq!(
            metrics.pending().iter().map(|m| m.id).collect::<Vec<_>>(),
            ids
        );

        metrics.record(Metric::new("c", 1.0));
        assert_eq!(metrics.flush().await.unwrap(), 3);
        assert_eq!(metrics.buffered(), 0);
    }

    #[tokio::test]
    async fn failing_transport_keeps_buffer_bounded() {
        let mut transport = MockMetricsTransport::new();
        transport
            .expect_send_batch()
            .returning(|_| Err(TelemetryError::Transport("down".into())));

        let config = TelemetryConfig::default().with_buffer_limit(1);
        let metrics = client(transport, config);
        for i in 0..12 {
            metrics.record(Metric::new(format!("m{i}"), 1.0));
        }
        assert_eq!(metrics.buffered(), config.max_buffered());
        assert_eq!(metrics.pending()[0].name, "m2");

        assert!(metrics.flush().await.is_err());
        metrics.record(Metric::new("m12", 1.0));

        let names: Vec<String> = metrics.pending().into_iter().map(|m| m.name).collect();
        assert_eq!(names.len(), 10);
        assert_eq!(names.first().map(String::as_str), Some("m3"));
        assert_eq!(names.last().map(String::as_str), Some("m12"));
        assert_eq!(metrics.stats().dropped, 3);
    }

    #[tokio::test]
    async fn send_metric_carries_unit_and_tags() {
        let metrics = client(MockMetricsTransport::new(), TelemetryConfig::default());
        let tags = Tags::from([("agent_id".to_string(), "legacy-parser".to_string())]);
        metrics.send_metric("parser.speed", 600.0, Some("lines/min"), Some(tags));

        let pending = metrics.pending();
        assert_eq!(pending[0].unit.as_deref(), Some("lines/min"));
        assert_eq!(pending[0].tags["agent_id"], "legacy-parser");
    }

    #[tokio::test(start_paused = true)]
    async fn auto_flush_runs_on_interval() {
        let mut transport = MockMetricsTransport::new();
        transport.expect_send_batch().times(1).returning(|_| Ok(()));

        let metrics = Arc::new(client(transport, TelemetryConfig::default()));
        let worker = metrics.spawn_auto_flush();
        metrics.record(Metric::new("a", 1.0));

        tokio::time::sleep(Duration::from_millis(4_000)).await;
        assert_eq!(metrics.buffered(), 1);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(metrics.buffered(), 0);
        worker.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn full_buffer_flushes_immediately() {
        let mut transport = MockMetricsTransport::new();
        transport
            .expect_send_batch()
            .withf(|batch: &[Metric]| batch.len() == 3)
            .times(1)
            .returning(|_| Ok(()));

        let config = TelemetryConfig::default().with_buffer_limit(3);
        let metrics = Arc::new(client(transport, config));
        let worker = metrics.spawn_auto_flush();

        for name in ["a", "b", "c"] {
            metrics.record(Metric::new(name, 1.0));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(metrics.buffered(), 0);
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_flushes_remaining_metrics() {
        let mut transport = MockMetricsTransport::new();
        transport.expect_send_batch().times(1).returning(|_| Ok(()));

        let metrics = Arc::new(client(transport, TelemetryConfig::default()));
        let worker = metrics.spawn_auto_flush();
        metrics.record(Metric::new("last", 1.0));
        worker.shutdown().await;

        assert_eq!(metrics.buffered(), 0);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let config = TelemetryConfig::default().with_buffer_limit(0);
        let err = BufferedMetrics::new(config, Arc::new(MockMetricsTransport::new())).unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidConfig { field: "buffer_limit", .. }));
    }
}
