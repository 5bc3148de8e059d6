//! Orchestrator configuration

use crate::error::ConfigError;
use crate::types::AgentId;
use ghostwire_bus::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use serde::{Deserialize, Serialize};

/// Orchestrator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Id messages for the orchestrator itself are addressed to
    pub review_channel: AgentId,
    /// Attempt ceiling for every routed message
    pub max_attempts: u32,
    /// Requeue timing after a failed attempt
    pub retry: RetryPolicy,
    /// Capacity of the review and error broadcast channels
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            review_channel: AgentId::new("orchestrator"),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry: RetryPolicy::Immediate,
            event_capacity: 256,
        }
    }
}

impl OrchestratorConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_review_channel(mut self, id: impl Into<AgentId>) -> Self {
        self.review_channel = id.into();
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Check ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.review_channel.as_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "review_channel",
                reason: "must not be empty".into(),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "max_attempts",
                reason: "must be at least 1".into(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_capacity",
                reason: "must be at least 1".into(),
            });
        }
        if let RetryPolicy::Exponential { base_ms, max_ms } = self.retry {
            if base_ms > max_ms {
                return Err(ConfigError::Invalid {
                    field: "retry",
                    reason: format!("base_ms {base_ms} exceeds max_ms {max_ms}"),
                });
            }
        }
        Ok(())
    }
}
