//! Error types for the message bus

/// Errors raised by bus operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// A message must be allowed at least one attempt
    #[error("max_attempts must be at least 1, got {0}")]
    InvalidMaxAttempts(u32),

    /// Topic names must be non-empty
    #[error("topic name must not be empty")]
    EmptyTopic,

    /// The bus has been stopped and accepts no further work
    #[error("message bus is stopped")]
    Stopped,
}

/// Failure reported by a topic handler
///
/// A retryable failure counts one attempt against the message. A rejection
/// retires it at once.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerFailure {
    message: String,
    retryable: bool,
}

impl HandlerFailure {
    /// Create a retryable failure with a description
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// Create a failure that retrying cannot fix
    #[inline]
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Failure description
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
