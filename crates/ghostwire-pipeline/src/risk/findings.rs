//! Finding rules
//!
//! Every rule is independent and deterministic. Output order follows rule
//! order, and within the deprecated-pattern rule, the pattern set's order.

use super::{Location, RiskFactor, SecurityIssue, Severity};
use crate::model::{ParseResult, TranslationResult};
use once_cell::sync::Lazy;
use regex::Regex;

/// Mappings below this confidence are flagged
pub const LOW_CONFIDENCE: f64 = 0.8;

/// Complexity above this is flagged
pub const COMPLEXITY_LIMIT: u32 = 20;

static HARDCODED_PASSWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)password\s*=\s*["'][^"']+["']"#).expect("valid password pattern")
});

static LOOP_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"for\s+").expect("valid loop pattern"));

/// Factors derived from the parse and translation
#[must_use]
pub fn risk_factors(translation: &TranslationResult, parse: &ParseResult) -> Vec<RiskFactor> {
    let location = Location {
        file: translation.target_file.clone(),
        line: None,
    };
    let mut factors = Vec::new();

    for pattern in &parse.metadata.deprecated_patterns {
        factors.push(RiskFactor {
            category: "Deprecated Pattern".into(),
            severity: Severity::High,
            description: format!("Legacy code uses {pattern}"),
            location: location.clone(),
            recommendation: "Review translation to ensure modern equivalent is correct".into(),
        });
    }

    let low_confidence = translation.low_confidence_count(LOW_CONFIDENCE);
    if low_confidence > 0 {
        let first_line = translation
            .mappings
            .iter()
            .find(|m| m.confidence < LOW_CONFIDENCE)
            .map(|m| m.target_line);
        factors.push(RiskFactor {
            category: "Translation Confidence".into(),
            severity: Severity::Medium,
            description: format!("{low_confidence} translations with confidence < 80%"),
            location: Location {
                line: first_line,
                ..location.clone()
            },
            recommendation: "Manual review recommended for low-confidence translations".into(),
        });
    }

    if parse.metadata.complexity > COMPLEXITY_LIMIT {
        factors.push(RiskFactor {
            category: "Code Complexity".into(),
            severity: Severity::Medium,
            description: format!("High cyclomatic complexity: {}", parse.metadata.complexity),
            location,
            recommendation: "Consider refactoring to reduce complexity".into(),
        });
    }

    factors
}

/// Pattern checks against translated code; each adds at most one issue
#[must_use]
pub fn security_issues(translated_code: &str) -> Vec<SecurityIssue> {
    let code = translated_code.to_lowercase();
    let mut issues = Vec::new();

    if code.contains("execute(") && code.contains('+') {
        issues.push(SecurityIssue {
            kind: "SQL Injection".into(),
            severity: Severity::High,
            description: "Potential SQL injection vulnerability detected".into(),
        });
    }
    if HARDCODED_PASSWORD.is_match(&code) {
        issues.push(SecurityIssue {
            kind: "Hardcoded Credentials".into(),
            severity: Severity::Critical,
            description: "Hardcoded credentials found in code".into(),
        });
    }
    if code.contains("eval(") {
        issues.push(SecurityIssue {
            kind: "Unsafe Eval".into(),
            severity: Severity::High,
            description: "Use of eval() function detected".into(),
        });
    }
    if code.contains("input(") && !code.contains("validate") {
        issues.push(SecurityIssue {
            kind: "Missing Input Validation".into(),
            severity: Severity::Medium,
            description: "User input without apparent validation".into(),
        });
    }

    issues
}

/// Performance smells in translated code
#[must_use]
pub fn performance_warnings(translated_code: &str) -> Vec<String> {
    let code = translated_code.to_lowercase();
    let mut warnings = Vec::new();

    if LOOP_KEYWORD.find_iter(&code).count() > 2 {
        warnings.push("Multiple nested loops detected - may impact performance".into());
    }
    if code.contains("+=") && code.contains("for") {
        warnings.push("String concatenation in loop - consider using list and join()".into());
    }
    if code.matches("execute(").count() > 5 {
        warnings.push("Multiple database calls detected - consider batching operations".into());
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{SourceLanguage, TargetLanguage};
    use crate::model::{LineMapping, ParseMetadata};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn parse(complexity: u32, deprecated: &[&str]) -> ParseResult {
        ParseResult {
            language: SourceLanguage::Cobol,
            functions: Vec::new(),
            dependencies: Vec::new(),
            metadata: ParseMetadata {
                lines_of_code: 10,
                complexity,
                deprecated_patterns: deprecated.iter().map(|s| (*s).to_string()).collect::<BTreeSet<_>>(),
            },
        }
    }

    fn translation(confidences: &[f64], code: &str) -> TranslationResult {
        TranslationResult {
            target_file: "payroll.py".into(),
            target_language: TargetLanguage::Python,
            translated_code: code.into(),
            mappings: confidences
                .iter()
                .enumerate()
                .map(|(i, &confidence)| LineMapping {
                    source_line: i + 1,
                    target_line: i + 10,
                    confidence,
                })
                .collect(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn one_factor_per_deprecated_pattern() {
        let factors = risk_factors(
            &translation(&[], ""),
            &parse(1, &["ALTER statement", "GO TO statement"]),
        );
        assert_eq!(factors.len(), 2);
        assert!(factors
            .iter()
            .all(|f| f.category == "Deprecated Pattern" && f.severity == Severity::High));
        assert_eq!(factors[0].description, "Legacy code uses ALTER statement");
    }

    #[test]
    fn low_confidence_is_one_factor_with_count() {
        let factors = risk_factors(&translation(&[0.9, 0.5, 0.75], ""), &parse(1, &[]));
        assert_eq!(factors.len(), 1);
        assert_eq!(factors[0].category, "Translation Confidence");
        assert_eq!(factors[0].severity, Severity::Medium);
        assert_eq!(factors[0].description, "2 translations with confidence < 80%");
        assert_eq!(factors[0].location.line, Some(11));
    }

    #[test]
    fn complexity_over_limit() {
        assert!(risk_factors(&translation(&[], ""), &parse(20, &[])).is_empty());
        let factors = risk_factors(&translation(&[], ""), &parse(21, &[]));
        assert_eq!(factors[0].category, "Code Complexity");
    }

    #[test]
    fn security_checks_are_independent() {
        let code = r#"
PASSWORD = "hunter2"
cursor.execute("SELECT * FROM t WHERE id=" + user_id)
value = eval(expr)
name = input("name? ")
"#;
        let kinds: Vec<String> = security_issues(code).into_iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                "SQL Injection",
                "Hardcoded Credentials",
                "Unsafe Eval",
                "Missing Input Validation"
            ]
        );
    }

    #[test]
    fn validated_input_is_not_flagged() {
        let code = "name = validate_name(input('name? '))";
        assert!(security_issues(code).is_empty());
    }

    #[test]
    fn performance_rules() {
        let code = "for a in x:\n  for b in y:\n    for c in z:\n      s += c\n";
        assert_eq!(performance_warnings(code).len(), 2);

        let calls = "execute(1)\n".repeat(6);
        assert_eq!(
            performance_warnings(&calls),
            vec!["Multiple database calls detected - consider batching operations".to_string()]
        );
        assert!(performance_warnings("def f():\n    pass\n").is_empty());
    }
}
