//! Error types for Ghostwire Core
//!
//! Provides error handling for:
//! - Agent lifecycle and registry failures
//! - Handler failures, classified for retry decisions
//! - Structured error events surfaced to observers
//! - Configuration validation

use crate::types::{AgentId, AgentState};
use chrono::{DateTime, Utc};
use ghostwire_bus::BusError;
use serde::{Deserialize, Serialize};

/// Agent and registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// `start` called while not stopped
    #[error("agent {0} is already running")]
    AlreadyRunning(AgentId),

    /// Message delivered to an agent that is not running
    #[error("agent {0} is not running")]
    NotRunning(AgentId),

    /// Registration with an id already in the registry
    #[error("agent {0} is already registered")]
    DuplicateAgent(AgentId),

    /// Registration with an id reserved by the orchestrator
    #[error("agent id {0} is reserved")]
    ReservedId(AgentId),

    /// Start or stop hook failed
    #[error("{hook} hook of agent {agent} failed: {reason}")]
    LifecycleHook {
        agent: AgentId,
        hook: &'static str,
        reason: String,
    },

    /// Lifecycle transition outside the state machine
    #[error("agent {agent}: illegal transition {from:?} -> {to:?}")]
    IllegalTransition {
        agent: AgentId,
        from: AgentState,
        to: AgentState,
    },

    /// Outbound channel already taken or closed
    #[error("outbound channel of agent {0} is unavailable")]
    ChannelClosed(AgentId),

    /// Orchestrator already stopped; it is single-use
    #[error("orchestrator has been shut down")]
    ShutDown,

    /// Underlying bus rejected an operation
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
}

impl AgentError {
    /// Check if the error is a lifecycle ordering problem rather than a fault
    #[inline]
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRunning(_) | Self::NotRunning(_) | Self::IllegalTransition { .. }
        )
    }
}

/// Failure raised by an agent's request or notification handler
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// Malformed request, rejected before any work
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown language, language pair or target
    #[error("unsupported: {0}")]
    UnsupportedCapability(String),

    /// Failure during processing that may succeed on another attempt
    #[error("transient failure: {0}")]
    Transient(String),
}

impl HandlerError {
    /// Validation failure
    #[inline]
    #[must_use]
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Unsupported capability
    #[inline]
    #[must_use]
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedCapability(reason.into())
    }

    /// Transient failure
    #[inline]
    #[must_use]
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient(reason.into())
    }

    /// Only transient failures are retried by the bus
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classification tag
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Validation,
            Self::UnsupportedCapability(_) => ErrorClass::UnsupportedCapability,
            Self::Transient(_) => ErrorClass::Transient,
        }
    }
}

/// Coarse classification carried on error events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Validation,
    UnsupportedCapability,
    Transient,
    /// Handler panicked
    Panic,
    /// Delivery to a stopped agent
    NotRunning,
    /// Outbound send failed
    Delivery,
}

impl ErrorClass {
    /// Classes the bus retries: explicit transient failures and panics
    #[inline]
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient | Self::Panic)
    }
}

/// Structured error event
///
/// Emitted in place of a propagated error whenever a handler fails, so one
/// agent's failure never unwinds into the orchestrator or its siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentErrorEvent {
    /// Rendered error
    pub error: String,
    /// Classification
    pub class: ErrorClass,
    /// Agent that failed
    pub agent_id: AgentId,
    /// Tool or stage name, if the agent reports one
    pub tool_name: Option<String>,
    /// Free-form context (message id, source file, ...)
    pub context: serde_json::Value,
    /// Whether the bus will attempt the message again
    pub retryable: bool,
    /// When the failure happened
    pub timestamp: DateTime<Utc>,
}

impl AgentErrorEvent {
    /// Create event with empty context
    #[must_use]
    pub fn new(agent_id: AgentId, class: ErrorClass, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            class,
            agent_id,
            tool_name: None,
            context: serde_json::Value::Object(serde_json::Map::new()),
            retryable: class.is_retryable(),
            timestamp: Utc::now(),
        }
    }

    /// Event for a handler failure
    #[must_use]
    pub fn from_handler(agent_id: AgentId, error: &HandlerError) -> Self {
        Self::new(agent_id, error.class(), error.to_string())
    }

    /// With tool name
    #[must_use]
    pub fn with_tool(mut self, tool_name: Option<String>) -> Self {
        self.tool_name = tool_name;
        self
    }

    /// With context; a non-object value is wrapped under `"detail"`
    #[must_use]
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = match context {
            serde_json::Value::Object(_) => context,
            serde_json::Value::Null => self.context,
            other => serde_json::json!({ "detail": other }),
        };
        self
    }

    /// Insert one context field
    #[must_use]
    pub fn with_context_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        if let serde_json::Value::Object(map) = &mut self.context {
            map.insert(key.to_string(), value.into());
        }
        self
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A field value is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(HandlerError::transient("io").is_retryable());
        assert!(!HandlerError::validation("empty").is_retryable());
        assert!(!HandlerError::unsupported("rust").is_retryable());
    }

    #[test]
    fn event_from_handler_error() {
        let event = AgentErrorEvent::from_handler(
            AgentId::new("legacy-parser"),
            &HandlerError::unsupported("language cobol85"),
        )
        .with_tool(Some("parse_legacy_code".into()))
        .with_context_field("source_file", "a.cbl");

        assert_eq!(event.class, ErrorClass::UnsupportedCapability);
        assert!(!event.retryable);
        assert_eq!(event.tool_name.as_deref(), Some("parse_legacy_code"));
        assert_eq!(event.context["source_file"], "a.cbl");
        assert!(event.error.contains("cobol85"));
    }

    #[test]
    fn scalar_context_is_wrapped() {
        let event = AgentErrorEvent::new(AgentId::new("a"), ErrorClass::Panic, "boom")
            .with_context(serde_json::json!(42));
        assert_eq!(event.context["detail"], 42);
    }

    #[test]
    fn lifecycle_errors() {
        assert!(AgentError::NotRunning(AgentId::new("a")).is_lifecycle());
        assert!(!AgentError::DuplicateAgent(AgentId::new("a")).is_lifecycle());
    }
}
