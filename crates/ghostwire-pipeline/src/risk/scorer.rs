use super::{RiskFactor, SecurityIssue};

/// Scores above this require human review
pub const REVIEW_THRESHOLD: u8 = 70;

const MAX_SCORE: u32 = 100;
const PERFORMANCE_WARNING_WEIGHT: u32 = 2;

/// Weighted sum of findings, clamped to 100
///
/// Pure: depends only on severities and the warning count.
#[must_use]
pub fn score(
    risk_factors: &[RiskFactor],
    security_issues: &[SecurityIssue],
    performance_warnings: &[String],
) -> u8 {
    let factors: u32 = risk_factors.iter().map(|f| f.severity.weight()).sum();
    let issues: u32 = security_issues.iter().map(|i| i.severity.weight()).sum();
    let warnings = u32::try_from(performance_warnings.len())
        .unwrap_or(u32::MAX)
        .saturating_mul(PERFORMANCE_WARNING_WEIGHT);

    let raw = factors.saturating_add(issues).saturating_add(warnings);
    // Clamped to 100, always fits
    u8::try_from(raw.min(MAX_SCORE)).unwrap_or(u8::MAX)
}
