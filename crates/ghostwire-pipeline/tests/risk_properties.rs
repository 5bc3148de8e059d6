//! Property tests for risk scoring and gating

use ghostwire_pipeline::risk::{self, findings, score, RiskFactor, SecurityIssue};
use ghostwire_pipeline::{Location, RiskEvaluationRequest, Severity, REVIEW_THRESHOLD};
use ghostwire_pipeline::{RiskReport, SourceLanguage};
use ghostwire_test_utils::{parse_result, translation};
use proptest::prelude::*;

fn severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Low),
        Just(Severity::Medium),
        Just(Severity::High),
        Just(Severity::Critical),
    ]
}

fn factor(severity: Severity) -> RiskFactor {
    RiskFactor {
        category: "Generated".into(),
        severity,
        description: String::new(),
        location: Location {
            file: "a.py".into(),
            line: None,
        },
        recommendation: String::new(),
    }
}

fn issue(severity: Severity) -> SecurityIssue {
    SecurityIssue {
        kind: "Generated".into(),
        severity,
        description: String::new(),
    }
}

fn findings_strategy() -> impl Strategy<Value = (Vec<RiskFactor>, Vec<SecurityIssue>, Vec<String>)>
{
    (
        prop::collection::vec(severity().prop_map(factor), 0..8),
        prop::collection::vec(severity().prop_map(issue), 0..8),
        prop::collection::vec("[a-z ]{0,12}", 0..8),
    )
}

proptest! {
    #[test]
    fn score_is_within_bounds((factors, issues, warnings) in findings_strategy()) {
        prop_assert!(score(&factors, &issues, &warnings) <= 100);
    }

    #[test]
    fn score_is_pure((factors, issues, warnings) in findings_strategy()) {
        prop_assert_eq!(
            score(&factors, &issues, &warnings),
            score(&factors.clone(), &issues.clone(), &warnings.clone())
        );
    }

    #[test]
    fn adding_a_finding_never_lowers_the_score(
        (factors, issues, warnings) in findings_strategy(),
        extra in severity(),
    ) {
        let before = score(&factors, &issues, &warnings);

        let mut more_factors = factors.clone();
        more_factors.push(factor(extra));
        prop_assert!(score(&more_factors, &issues, &warnings) >= before);

        let mut more_issues = issues.clone();
        more_issues.push(issue(extra));
        prop_assert!(score(&factors, &more_issues, &warnings) >= before);

        let mut more_warnings = warnings.clone();
        more_warnings.push("slow".into());
        prop_assert!(score(&factors, &issues, &more_warnings) >= before);
    }

    #[test]
    fn review_flag_matches_threshold_or_critical((factors, issues, warnings) in findings_strategy()) {
        let has_critical = factors.iter().any(|f| f.severity == Severity::Critical)
            || issues.iter().any(|i| i.severity == Severity::Critical);
        let report = RiskReport::from_findings(factors, issues, warnings);
        prop_assert_eq!(
            report.requires_human_review,
            report.overall_score > REVIEW_THRESHOLD || has_critical
        );
    }

    #[test]
    fn low_confidence_count_is_reported(confidences in prop::collection::vec(0.0f64..=1.0, 0..12)) {
        let low = confidences.iter().filter(|c| **c < findings::LOW_CONFIDENCE).count();
        let request = RiskEvaluationRequest {
            translation_result: translation("a.py", &confidences, ""),
            parse_result: parse_result(SourceLanguage::Cobol, &[]),
        };
        let report = risk::evaluate(&request);
        let confidence_factors: Vec<&RiskFactor> = report
            .risk_factors
            .iter()
            .filter(|f| f.category == "Translation Confidence")
            .collect();

        if low == 0 {
            prop_assert!(confidence_factors.is_empty());
        } else {
            prop_assert_eq!(confidence_factors.len(), 1);
            prop_assert_eq!(
                &confidence_factors[0].description,
                &format!("{low} translations with confidence < 80%")
            );
        }
    }
}

#[test]
fn two_low_confidence_mappings_yield_one_factor() {
    let request = RiskEvaluationRequest {
        translation_result: translation("payroll.py", &[0.9, 0.6, 0.7], ""),
        parse_result: parse_result(SourceLanguage::Cobol, &["MAIN-PARA"]),
    };
    let report = risk::evaluate(&request);
    assert_eq!(report.risk_factors.len(), 1);
    assert_eq!(report.risk_factors[0].category, "Translation Confidence");
    assert_eq!(report.risk_factors[0].severity, Severity::Medium);
    assert!(report.risk_factors[0].description.starts_with("2 "));
}
