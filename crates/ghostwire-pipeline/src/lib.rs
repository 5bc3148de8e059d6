//! Ghostwire Pipeline - legacy modernization stages
//!
//! Four agents cooperate over the orchestrator's bus:
//! - Parser: validates requests and extracts routines through a [`GrammarEngine`]
//! - Translator: emits target code through a [`CodegenEngine`] and fans out
//! - Test generator: renders suites through a [`TestSynthesizer`]
//! - Risk evaluator: scores findings and routes the verdict via the [`EscalationGate`]
//!
//! # Example
//!
//! ```rust,ignore
//! use ghostwire_pipeline::{ParseRequest, Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::builder().config(PipelineConfig::load("ghostwire.toml")?).build()?;
//! let mut review = pipeline.subscribe_review();
//! pipeline.start().await?;
//! pipeline.submit(ParseRequest::new("payroll.cbl", source, "COBOL"))?;
//! let verdict = review.recv().await?;
//! pipeline.stop().await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod codegen;
pub mod config;
pub mod error;
pub mod grammar;
pub mod language;
pub mod model;
pub mod pipeline;
pub mod risk;
pub mod stages;
pub mod testgen;

pub use codegen::{CodegenEngine, CodegenRule, RuleCodegen};
pub use config::{LoggingConfig, PipelineConfig, StageIds};
pub use error::{PipelineConfigError, PipelineError, StageError};
pub use grammar::{GrammarEngine, RegexGrammar};
pub use language::{SourceLanguage, TargetLanguage};
pub use model::{
    Coverage, EscalationNotice, FunctionInfo, GeneratedTests, LineMapping, ParseMetadata,
    ParseRequest, ParseResult, PipelinePayload, ReviewEvent, ReviewNotification,
    RiskEvaluationRequest, TestGenerationRequest, TestSuite, TranslationRequest,
    TranslationResult,
};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use risk::{
    EscalationGate, Location, RiskFactor, RiskReport, SecurityIssue, Severity, REVIEW_THRESHOLD,
};
pub use stages::{ParserStage, RiskEvaluatorStage, TestGeneratorStage, TranslatorStage};
pub use testgen::{TemplateSynthesizer, TestSynthesizer};
