//! Risk assessment of a translation
//!
//! - [`findings`]: deterministic checks producing factors, issues and warnings
//! - [`scorer`]: weighted, clamped score over the findings
//! - [`gate`]: human-review decision and review notification

pub mod findings;
pub mod gate;
pub mod scorer;

use crate::model::RiskEvaluationRequest;
use serde::{Deserialize, Serialize};

pub use gate::EscalationGate;
pub use scorer::{score, REVIEW_THRESHOLD};

/// Finding severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Score contribution of one finding
    #[inline]
    #[must_use]
    pub fn weight(self) -> u32 {
        match self {
            Self::Critical => 25,
            Self::High => 15,
            Self::Medium => 8,
            Self::Low => 3,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub category: String,
    pub severity: Severity,
    pub description: String,
    pub location: Location,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub description: String,
}

/// Terminal artifact of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskReport {
    /// In [0, 100]; higher is riskier
    pub overall_score: u8,
    pub risk_factors: Vec<RiskFactor>,
    pub security_issues: Vec<SecurityIssue>,
    pub performance_warnings: Vec<String>,
    pub requires_human_review: bool,
}

impl RiskReport {
    /// Assemble a report from findings, scoring and gating them
    #[must_use]
    pub fn from_findings(
        risk_factors: Vec<RiskFactor>,
        security_issues: Vec<SecurityIssue>,
        performance_warnings: Vec<String>,
    ) -> Self {
        let overall_score = score(&risk_factors, &security_issues, &performance_warnings);
        let requires_human_review =
            gate::requires_human_review(overall_score, &risk_factors, &security_issues);
        Self {
            overall_score,
            risk_factors,
            security_issues,
            performance_warnings,
            requires_human_review,
        }
    }

    /// Most severe finding, if any
    #[must_use]
    pub fn highest_severity(&self) -> Option<Severity> {
        self.risk_factors
            .iter()
            .map(|f| f.severity)
            .chain(self.security_issues.iter().map(|i| i.severity))
            .max()
    }
}

/// Run every check against a translation
#[must_use]
pub fn evaluate(request: &RiskEvaluationRequest) -> RiskReport {
    let translation = &request.translation_result;
    RiskReport::from_findings(
        findings::risk_factors(translation, &request.parse_result),
        findings::security_issues(&translation.translated_code),
        findings::performance_warnings(&translation.translated_code),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_by_impact() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(Severity::Critical.weight(), 25);
        assert_eq!(Severity::Low.weight(), 3);
    }

    #[test]
    fn security_issue_serializes_kind_as_type() {
        let issue = SecurityIssue {
            kind: "Unsafe Eval".into(),
            severity: Severity::High,
            description: "eval".into(),
        };
        let json = serde_json::to_value(issue).unwrap();
        assert_eq!(json["type"], "Unsafe Eval");
        assert_eq!(json["severity"], "high");
    }
}
