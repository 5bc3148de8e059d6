//! Private agent key-value memory
//!
//! Writes are observable: every `set` emits [`AgentEvent::MemoryUpdated`].

use crate::event::AgentEvent;
use crate::types::AgentId;
use chrono::Utc;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

/// Agent-owned key-value store
#[derive(Debug)]
pub struct AgentMemory {
    agent_id: AgentId,
    entries: DashMap<String, serde_json::Value>,
    events: broadcast::Sender<AgentEvent>,
}

impl AgentMemory {
    pub(crate) fn new(agent_id: AgentId, events: broadcast::Sender<AgentEvent>) -> Self {
        Self {
            agent_id,
            entries: DashMap::new(),
            events,
        }
    }

    /// Store a value and notify observers
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        let key = key.into();
        self.entries.insert(key.clone(), value.clone());
        let _ = self.events.send(AgentEvent::MemoryUpdated {
            agent_id: self.agent_id.clone(),
            key,
            value,
            timestamp: Utc::now(),
        });
    }

    /// Store any serializable value
    ///
    /// # Errors
    /// Returns the serialization error if `value` cannot be represented as JSON.
    pub fn set_as<V: Serialize>(
        &self,
        key: impl Into<String>,
        value: &V,
    ) -> Result<(), serde_json::Error> {
        self.set(key, serde_json::to_value(value)?);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    /// Typed read; `None` when missing or of another shape
    #[must_use]
    pub fn get_as<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    /// Add `delta` to a numeric counter (missing counts as zero)
    pub fn increment(&self, key: &str, delta: u64) -> u64 {
        let next = {
            let mut entry = self
                .entries
                .entry(key.to_string())
                .or_insert(serde_json::Value::from(0u64));
            let next = entry.as_u64().unwrap_or(0).saturating_add(delta);
            *entry = serde_json::Value::from(next);
            next
        };
        let _ = self.events.send(AgentEvent::MemoryUpdated {
            agent_id: self.agent_id.clone(),
            key: key.to_string(),
            value: serde_json::Value::from(next),
            timestamp: Utc::now(),
        });
        next
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
        let _ = self.events.send(AgentEvent::MemoryCleared {
            agent_id: self.agent_id.clone(),
        });
    }
}
