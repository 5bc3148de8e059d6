//! Retry timing
//!
//! The queue layer retries a failed message by pushing it back to the tail
//! of its topic. [`RetryPolicy`] decides how long the message waits before
//! it re-enters the queue; [`RetryScheduler`] owns the pending timers.

use crate::message::QueueMessage;
use crate::topic::TopicQueue;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Delay applied before a failed message is requeued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Requeue to the tail at once
    #[default]
    Immediate,

    /// Wait a constant delay
    Fixed {
        /// Delay in milliseconds
        delay_ms: u64,
    },

    /// Wait `base_ms * 2^(attempts - 1)`, capped at `max_ms`
    Exponential {
        /// First retry delay in milliseconds
        base_ms: u64,
        /// Upper bound in milliseconds
        max_ms: u64,
    },
}

impl RetryPolicy {
    /// Delay before the next attempt, given the failures recorded so far
    #[must_use]
    pub fn delay_for(&self, attempts: u32) -> Duration {
        match *self {
            Self::Immediate => Duration::ZERO,
            Self::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Self::Exponential { base_ms, max_ms } => {
                let exponent = attempts.saturating_sub(1);
                let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
                Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
            }
        }
    }
}

/// Schedules requeues according to a [`RetryPolicy`]
///
/// Zero delays requeue inline. Non-zero delays park the message on a
/// Tokio timer; [`RetryScheduler::cancel_all`] drops every parked message.
#[derive(Debug, Default)]
pub struct RetryScheduler {
    policy: RetryPolicy,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl RetryScheduler {
    /// Create scheduler for a policy
    #[inline]
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Active policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Number of messages parked on a timer
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let mut pending = self.pending.lock();
        pending.retain(|handle| !handle.is_finished());
        pending.len()
    }

    pub(crate) fn schedule<T: Send + 'static>(
        &self,
        queue: Arc<TopicQueue<T>>,
        message: QueueMessage<T>,
    ) {
        let delay = self.policy.delay_for(message.attempts());
        if delay.is_zero() {
            queue.push_back(message);
            return;
        }

        tracing::debug!(
            topic = %queue.name(),
            id = %message.id,
            delay_ms = delay.as_millis() as u64,
            "Parking message before retry"
        );
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.push_back(message);
        });

        let mut pending = self.pending.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Abort all parked requeues
    pub fn cancel_all(&self) {
        for handle in self.pending.lock().drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_has_no_delay() {
        assert_eq!(RetryPolicy::Immediate.delay_for(1), Duration::ZERO);
        assert_eq!(RetryPolicy::Immediate.delay_for(10), Duration::ZERO);
    }

    #[test]
    fn fixed_delay_is_constant() {
        let policy = RetryPolicy::Fixed { delay_ms: 250 };
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(4), Duration::from_millis(250));
    }

    #[test]
    fn exponential_doubles_and_caps() {
        let policy = RetryPolicy::Exponential {
            base_ms: 1000,
            max_ms: 5000,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(5000));
        assert_eq!(policy.delay_for(200), Duration::from_millis(5000));
    }

    #[test]
    fn policy_deserializes_from_tagged_form() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"policy":"exponential","base_ms":10,"max_ms":80}"#).unwrap();
        assert_eq!(
            policy,
            RetryPolicy::Exponential {
                base_ms: 10,
                max_ms: 80
            }
        );
    }
}
