//! Queued message envelope

use crate::error::BusError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique queue message identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueueMessageId(pub Ulid);

impl QueueMessageId {
    /// Generate new message ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for QueueMessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QueueMessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "msg_{}", self.0)
    }
}

/// What the bus does with a message after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempts remain; push to the tail of the topic queue
    Requeue,
    /// Budget exhausted; discard without persistence
    Retire,
}

/// A payload waiting in a topic queue
///
/// Invariant: `0 <= attempts <= max_attempts`.
#[derive(Debug, Clone)]
pub struct QueueMessage<T> {
    /// Message ID
    pub id: QueueMessageId,
    /// Topic the message was published to
    pub topic: String,
    /// Opaque payload
    pub payload: T,
    /// When the message was first published
    pub enqueued_at: DateTime<Utc>,
    attempts: u32,
    max_attempts: u32,
}

impl<T> QueueMessage<T> {
    /// Wrap a payload with a fresh attempt counter
    ///
    /// # Errors
    /// - `BusError::InvalidMaxAttempts` if `max_attempts` is zero
    pub fn new(topic: impl Into<String>, payload: T, max_attempts: u32) -> Result<Self, BusError> {
        if max_attempts == 0 {
            return Err(BusError::InvalidMaxAttempts(max_attempts));
        }
        Ok(Self {
            id: QueueMessageId::new(),
            topic: topic.into(),
            payload,
            enqueued_at: Utc::now(),
            attempts: 0,
            max_attempts,
        })
    }

    /// Failed attempts so far
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Attempt ceiling
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether the retry budget is spent
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Count a failed attempt and decide the message's fate
    pub fn record_failure(&mut self) -> RetryDecision {
        self.attempts = (self.attempts + 1).min(self.max_attempts);
        if self.is_exhausted() {
            RetryDecision::Retire
        } else {
            RetryDecision::Requeue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_max_attempts_is_rejected() {
        let result = QueueMessage::new("topic", (), 0);
        assert_eq!(result.unwrap_err(), BusError::InvalidMaxAttempts(0));
    }

    #[test]
    fn record_failure_retires_at_ceiling() {
        let mut msg = QueueMessage::new("topic", 1u8, 3).unwrap();
        assert_eq!(msg.record_failure(), RetryDecision::Requeue);
        assert_eq!(msg.record_failure(), RetryDecision::Requeue);
        assert_eq!(msg.record_failure(), RetryDecision::Retire);
        assert_eq!(msg.attempts(), 3);

        // Never exceeds the ceiling
        assert_eq!(msg.record_failure(), RetryDecision::Retire);
        assert_eq!(msg.attempts(), 3);
    }

    #[test]
    fn single_attempt_retires_immediately() {
        let mut msg = QueueMessage::new("topic", (), 1).unwrap();
        assert_eq!(msg.record_failure(), RetryDecision::Retire);
    }

    #[test]
    fn ids_are_unique() {
        let a = QueueMessageId::new();
        let b = QueueMessageId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("msg_"));
    }
}
