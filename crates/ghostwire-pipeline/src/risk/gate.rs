//! Human-review decision
//!
//! A report escalates when its score exceeds [`REVIEW_THRESHOLD`] or when
//! any finding is critical, whatever the score.

use super::scorer::REVIEW_THRESHOLD;
use super::{RiskFactor, RiskReport, SecurityIssue, Severity};
use crate::model::{EscalationNotice, ReviewEvent, ReviewNotification};
use tracing::{info, warn};

#[must_use]
pub fn requires_human_review(
    score: u8,
    risk_factors: &[RiskFactor],
    security_issues: &[SecurityIssue],
) -> bool {
    score > REVIEW_THRESHOLD
        || security_issues.iter().any(|i| i.severity == Severity::Critical)
        || risk_factors.iter().any(|f| f.severity == Severity::Critical)
}

/// Turns a report into the review-channel notification
#[derive(Debug, Clone, Copy, Default)]
pub struct EscalationGate;

impl EscalationGate {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Build the notification for a report
    ///
    /// Escalations carry `high_risk_detected` and require action; everything
    /// else is `risk_evaluation_complete`.
    #[must_use]
    pub fn route(&self, report: RiskReport, target_file: &str) -> ReviewNotification {
        let escalate = report.requires_human_review;
        let event = if escalate {
            ReviewEvent::HighRiskDetected
        } else {
            ReviewEvent::RiskEvaluationComplete
        };

        let severity = match report.highest_severity() {
            Some(Severity::Critical) => Severity::Critical,
            _ if escalate => Severity::High,
            _ => Severity::Low,
        };
        let message = if escalate {
            format!(
                "{target_file} requires human review (risk score {})",
                report.overall_score
            )
        } else {
            format!(
                "{target_file} passed risk evaluation (risk score {})",
                report.overall_score
            )
        };

        if escalate {
            warn!(target_file, score = report.overall_score, %severity, "High risk detected");
        } else {
            info!(target_file, score = report.overall_score, "Risk evaluation complete");
        }

        ReviewNotification {
            event,
            target_file: target_file.to_string(),
            notice: EscalationNotice {
                severity,
                message,
                ticket_id: None,
                action_required: escalate,
            },
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn critical_issue() -> SecurityIssue {
        SecurityIssue {
            kind: "Hardcoded Credentials".into(),
            severity: Severity::Critical,
            description: String::new(),
        }
    }

    #[test]
    fn threshold_is_exclusive() {
        assert!(!requires_human_review(70, &[], &[]));
        assert!(requires_human_review(71, &[], &[]));
    }

    #[test]
    fn critical_issue_escalates_regardless_of_score() {
        let report = RiskReport::from_findings(Vec::new(), vec![critical_issue()], Vec::new());
        assert_eq!(report.overall_score, 25);
        assert!(report.requires_human_review);

        let notification = EscalationGate::new().route(report, "creds.py");
        assert_eq!(notification.event, ReviewEvent::HighRiskDetected);
        assert_eq!(notification.notice.severity, Severity::Critical);
        assert!(notification.action_required());
        assert!(notification.notice.ticket_id.is_none());
    }

    #[test]
    fn clean_report_completes() {
        let report = RiskReport::from_findings(Vec::new(), Vec::new(), Vec::new());
        let notification = EscalationGate::new().route(report, "clean.py");
        assert_eq!(notification.event, ReviewEvent::RiskEvaluationComplete);
        assert_eq!(notification.notice.severity, Severity::Low);
        assert!(!notification.action_required());
    }
}
