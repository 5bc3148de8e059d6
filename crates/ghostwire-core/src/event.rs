//! Observable agent events

use crate::error::AgentErrorEvent;
use crate::message::{MessageId, MessageKind};
use crate::types::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Agent event stream item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    Started {
        agent_id: AgentId,
    },
    Stopped {
        agent_id: AgentId,
    },
    MessageReceived {
        agent_id: AgentId,
        message_id: MessageId,
        from: AgentId,
        kind: MessageKind,
    },
    MessageSent {
        agent_id: AgentId,
        message_id: MessageId,
        to: AgentId,
        kind: MessageKind,
    },
    MemoryUpdated {
        agent_id: AgentId,
        key: String,
        value: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    MemoryCleared {
        agent_id: AgentId,
    },
    Error(AgentErrorEvent),
}

impl AgentEvent {
    /// Agent the event belongs to
    #[must_use]
    pub fn agent_id(&self) -> &AgentId {
        match self {
            Self::Started { agent_id }
            | Self::Stopped { agent_id }
            | Self::MessageReceived { agent_id, .. }
            | Self::MessageSent { agent_id, .. }
            | Self::MemoryUpdated { agent_id, .. }
            | Self::MemoryCleared { agent_id } => agent_id,
            Self::Error(event) => &event.agent_id,
        }
    }
}
