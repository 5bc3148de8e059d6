//! Agent-to-agent messages
//!
//! Each message kind is a variant carrying its own typed payload, so
//! dispatch is a `match` rather than a string comparison.

use crate::error::AgentErrorEvent;
use crate::types::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique message ID, generated at send time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Generate new message ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message kind tag (for logs and events)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Request,
    Notification,
    Response,
    Error,
}

/// Message body by kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum MessageBody<P> {
    /// Ask the recipient to do work
    Request(P),
    /// Inform the recipient; no work implied
    Notification(P),
    /// Answer to an earlier request
    Response(P),
    /// Structured failure report
    Error(AgentErrorEvent),
}

impl<P> MessageBody<P> {
    /// Kind tag of this body
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Request(_) => MessageKind::Request,
            Self::Notification(_) => MessageKind::Notification,
            Self::Response(_) => MessageKind::Response,
            Self::Error(_) => MessageKind::Error,
        }
    }

    /// Payload for the payload-carrying kinds
    #[must_use]
    pub fn payload(&self) -> Option<&P> {
        match self {
            Self::Request(p) | Self::Notification(p) | Self::Response(p) => Some(p),
            Self::Error(_) => None,
        }
    }
}

/// Envelope routed by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage<P> {
    /// Unique ID
    pub id: MessageId,
    /// Sender agent
    pub from: AgentId,
    /// Recipient agent (also the bus topic)
    pub to: AgentId,
    /// Kind and payload
    pub body: MessageBody<P>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl<P> AgentMessage<P> {
    /// Create message with a fresh ID
    #[must_use]
    pub fn new(from: impl Into<AgentId>, to: impl Into<AgentId>, body: MessageBody<P>) -> Self {
        Self {
            id: MessageId::new(),
            from: from.into(),
            to: to.into(),
            body,
            created_at: Utc::now(),
        }
    }

    /// Request message
    #[inline]
    #[must_use]
    pub fn request(from: impl Into<AgentId>, to: impl Into<AgentId>, payload: P) -> Self {
        Self::new(from, to, MessageBody::Request(payload))
    }

    /// Notification message
    #[inline]
    #[must_use]
    pub fn notification(from: impl Into<AgentId>, to: impl Into<AgentId>, payload: P) -> Self {
        Self::new(from, to, MessageBody::Notification(payload))
    }

    /// Kind tag
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }
}
