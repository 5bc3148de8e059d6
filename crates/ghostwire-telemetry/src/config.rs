use crate::error::TelemetryError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Full batches kept while the transport is failing
pub const RETAINED_BATCHES: usize = 10;

/// Buffering and flush settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Auto-flush period
    pub flush_interval_ms: u64,
    /// Buffered metrics that trigger an immediate flush
    pub buffer_limit: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 5_000,
            buffer_limit: 100,
        }
    }
}

impl TelemetryConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_flush_interval_ms(mut self, ms: u64) -> Self {
        self.flush_interval_ms = ms;
        self
    }

    #[must_use]
    pub fn with_buffer_limit(mut self, limit: usize) -> Self {
        self.buffer_limit = limit;
        self
    }

    #[inline]
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Most metrics held before the oldest are dropped
    #[inline]
    #[must_use]
    pub fn max_buffered(&self) -> usize {
        self.buffer_limit.saturating_mul(RETAINED_BATCHES)
    }

    /// # Errors
    /// `TelemetryError::InvalidConfig` for a zero interval or limit.
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.flush_interval_ms == 0 {
            return Err(TelemetryError::InvalidConfig {
                field: "flush_interval_ms",
                reason: "must be at least 1".into(),
            });
        }
        if self.buffer_limit == 0 {
            return Err(TelemetryError::InvalidConfig {
                field: "buffer_limit",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
