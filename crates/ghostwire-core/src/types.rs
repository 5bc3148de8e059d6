//! Core types for agents
//!
//! - Agent identifiers and identities
//! - Lifecycle states
//! - The payload bound shared by messages, agents and the orchestrator

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::Debug;

/// Bound for message payloads carried between agents
pub trait Payload: Clone + Send + Sync + Debug + 'static {}

impl<T> Payload for T where T: Clone + Send + Sync + Debug + 'static {}

/// Unique agent identifier within a registry
///
/// Doubles as the topic key agents are addressed by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Create an ID from any string
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as `&str`
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AgentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&AgentId> for AgentId {
    fn from(value: &AgentId) -> Self {
        value.clone()
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for AgentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Who an agent is and what it declares it can do
///
/// Immutable once the agent is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Unique ID
    pub id: AgentId,
    /// Display name
    pub name: String,
    /// Declared capabilities (e.g. "parsing", "risk-scoring")
    pub capabilities: Vec<String>,
}

impl AgentIdentity {
    /// Create identity
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<AgentId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capabilities: Vec::new(),
        }
    }

    /// With declared capabilities
    #[must_use]
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Check if the agent declares a capability
    #[inline]
    #[must_use]
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

/// Agent lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Not accepting messages
    #[default]
    Stopped,
    /// Start hook in progress
    Starting,
    /// Accepting messages
    Running,
    /// Stop hook in progress
    Stopping,
}

impl AgentState {
    /// Whether messages may be dispatched
    #[inline]
    #[must_use]
    pub fn accepts_messages(self) -> bool {
        matches!(self, Self::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_capabilities() {
        let identity =
            AgentIdentity::new("legacy-parser", "Parser").with_capabilities(["parsing", "ast"]);
        assert!(identity.has_capability("parsing"));
        assert!(!identity.has_capability("translation"));
        assert_eq!(identity.id.as_str(), "legacy-parser");
    }

    #[test]
    fn agent_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&AgentId::new("risk-evaluator")).unwrap();
        assert_eq!(json, "\"risk-evaluator\"");
    }

    #[test]
    fn only_running_accepts_messages() {
        assert!(AgentState::Running.accepts_messages());
        assert!(!AgentState::Starting.accepts_messages());
        assert!(!AgentState::Stopping.accepts_messages());
        assert!(!AgentState::Stopped.accepts_messages());
    }
}
