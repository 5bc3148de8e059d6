//! Ghostwire Telemetry - buffered metrics
//!
//! - [`MetricsSink`]: the `send_metric(name, value, unit, tags)` seam stages record through
//! - [`BufferedMetrics`]: batching client with interval and size-triggered flushes
//! - [`MetricsTransport`]: batch delivery; [`TracingTransport`] logs each metric
//!
//! # Example
//!
//! ```rust,ignore
//! use ghostwire_telemetry::{BufferedMetrics, MetricsSink, TelemetryConfig, TracingTransport};
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(BufferedMetrics::new(TelemetryConfig::default(), Arc::new(TracingTransport))?);
//! let worker = metrics.spawn_auto_flush();
//! metrics.send_metric("parser.speed", 600.0, Some("lines/min"), None);
//! worker.shutdown().await;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod buffer;
pub mod config;
pub mod error;
pub mod metric;
pub mod sink;
pub mod transport;

pub use buffer::{AutoFlush, BufferedMetrics, FlushStats};
pub use config::{TelemetryConfig, RETAINED_BATCHES};
pub use error::TelemetryError;
pub use metric::{Metric, MetricId, Tags};
pub use sink::{MetricsSink, NoopMetrics};
pub use transport::{MetricsTransport, TracingTransport};
