//! Stage request and result artifacts
//!
//! Artifacts are produced once per input and passed by value to the next
//! stage; nothing mutates them after hand-off.

use crate::error::StageError;
use crate::language::{SourceLanguage, TargetLanguage};
use crate::risk::RiskReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Parser input
///
/// `language` stays a raw tag so unsupported languages are reported by
/// the parser rather than rejected while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseRequest {
    pub source_file: String,
    pub source_code: String,
    pub language: String,
    /// Translation target; the source language's default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<TargetLanguage>,
}

impl ParseRequest {
    #[must_use]
    pub fn new(
        source_file: impl Into<String>,
        source_code: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            source_file: source_file.into(),
            source_code: source_code.into(),
            language: language.into(),
            target_language: None,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: TargetLanguage) -> Self {
        self.target_language = Some(target);
        self
    }

    /// Check the request is well-formed
    ///
    /// # Errors
    /// `StageError::InvalidRequest` for an empty or escaping path, or empty source.
    pub fn validate(&self) -> Result<(), StageError> {
        if self.source_file.trim().is_empty() {
            return Err(StageError::InvalidRequest("source_file is empty".into()));
        }
        if self.source_file.split(['/', '\\']).any(|part| part == "..") {
            return Err(StageError::InvalidRequest(format!(
                "source_file {} escapes the workspace",
                self.source_file
            )));
        }
        if self.source_code.trim().is_empty() {
            return Err(StageError::InvalidRequest("source_code is empty".into()));
        }
        Ok(())
    }

    /// Resolve the language tag
    ///
    /// # Errors
    /// `StageError::UnsupportedLanguage` outside the supported set.
    pub fn source_language(&self) -> Result<SourceLanguage, StageError> {
        self.language.parse()
    }
}

/// Extracted routine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub parameters: Vec<String>,
    /// 1-based, inclusive
    pub line_start: usize,
    /// 1-based, inclusive
    pub line_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseMetadata {
    /// Non-blank, non-comment lines
    pub lines_of_code: usize,
    /// At least 1
    pub complexity: u32,
    pub deprecated_patterns: BTreeSet<String>,
}

/// Parser output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResult {
    pub language: SourceLanguage,
    pub functions: Vec<FunctionInfo>,
    pub dependencies: Vec<String>,
    pub metadata: ParseMetadata,
}

/// Translator input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub parse_result: ParseResult,
    pub source_file: String,
    pub language: SourceLanguage,
    pub target_language: TargetLanguage,
}

/// Source-to-target line correspondence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineMapping {
    pub source_line: usize,
    pub target_line: usize,
    /// In [0, 1]
    pub confidence: f64,
}

/// Translator output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub target_file: String,
    pub target_language: TargetLanguage,
    pub translated_code: String,
    pub mappings: Vec<LineMapping>,
    pub warnings: Vec<String>,
}

impl TranslationResult {
    /// Mappings below a confidence threshold
    #[must_use]
    pub fn low_confidence_count(&self, threshold: f64) -> usize {
        self.mappings
            .iter()
            .filter(|m| m.confidence < threshold)
            .count()
    }
}

/// Test generator input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestGenerationRequest {
    pub translation_result: TranslationResult,
    pub parse_result: ParseResult,
    pub source_file: String,
}

/// Declared coverage, each in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub lines: f64,
    pub functions: f64,
    pub branches: f64,
}

/// Generated test sources for one translated file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    pub target_language: TargetLanguage,
    pub test_file: String,
    pub unit_tests: String,
    pub integration_tests: String,
    pub regression_tests: String,
    pub test_count: usize,
    pub coverage: Coverage,
}

/// Risk evaluator input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskEvaluationRequest {
    pub translation_result: TranslationResult,
    pub parse_result: ParseResult,
}

/// Notification kinds sent to the review channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewEvent {
    HighRiskDetected,
    RiskEvaluationComplete,
    TestsGenerated,
}

impl ReviewEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HighRiskDetected => "high_risk_detected",
            Self::RiskEvaluationComplete => "risk_evaluation_complete",
            Self::TestsGenerated => "tests_generated",
        }
    }
}

/// Payload the escalation collaborator consumes; tickets are its concern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationNotice {
    pub severity: crate::risk::Severity,
    pub message: String,
    pub ticket_id: Option<String>,
    pub action_required: bool,
}

/// Risk verdict delivered to the review channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewNotification {
    pub event: ReviewEvent,
    pub target_file: String,
    pub report: RiskReport,
    pub notice: EscalationNotice,
}

impl ReviewNotification {
    #[inline]
    #[must_use]
    pub fn action_required(&self) -> bool {
        self.notice.action_required
    }
}

/// Generated suite delivered to the review channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedTests {
    pub source_file: String,
    pub target_file: String,
    pub suite: TestSuite,
}

/// Every payload routed between pipeline agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PipelinePayload {
    Parse(ParseRequest),
    Translate(TranslationRequest),
    GenerateTests(TestGenerationRequest),
    EvaluateRisk(RiskEvaluationRequest),
    Review(ReviewNotification),
    TestsGenerated(GeneratedTests),
}

impl PipelinePayload {
    /// Variant name for logs and errors
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse",
            Self::Translate(_) => "translate",
            Self::GenerateTests(_) => "generate_tests",
            Self::EvaluateRisk(_) => "evaluate_risk",
            Self::Review(_) => "review",
            Self::TestsGenerated(_) => "tests_generated",
        }
    }
}
