//! Metric data points

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ulid::Ulid;

/// Metric tags, ordered for stable serialization
pub type Tags = BTreeMap<String, String>;

/// Unique metric ID
///
/// Assigned when the metric is recorded and kept across flush retries, so
/// a receiver can drop duplicates from a re-sent batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricId(pub Ulid);

impl MetricId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for MetricId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MetricId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "metric_{}", self.0)
    }
}

/// One recorded data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: MetricId,
    /// Dotted name, e.g. `parser.speed`
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    #[must_use]
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            id: MetricId::new(),
            name: name.into(),
            value,
            unit: None,
            tags: Tags::new(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags.extend(tags);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_are_omitted() {
        let json = serde_json::to_value(Metric::new("risk.score", 42.0)).unwrap();
        assert!(json.get("unit").is_none());
        assert!(json.get("tags").is_none());
        assert_eq!(json["name"], "risk.score");
    }

    #[test]
    fn builder_sets_unit_and_tags() {
        let metric = Metric::new("parser.speed", 120.0)
            .with_unit("lines/min")
            .with_tag("language", "cobol");
        assert_eq!(metric.unit.as_deref(), Some("lines/min"));
        assert_eq!(metric.tags["language"], "cobol");
    }
}
