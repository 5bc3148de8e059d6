//! Error types for the pipeline
//!
//! Stage errors map onto the handler taxonomy:
//! - unsupported language, pair or target: `UnsupportedCapability`
//! - malformed or mis-addressed requests: `Validation`
//! - failed downstream sends: `Transient`

use crate::language::{SourceLanguage, TargetLanguage};
use ghostwire_core::{AgentError, ConfigError, HandlerError};
use ghostwire_telemetry::TelemetryError;
use std::path::PathBuf;

/// Errors raised inside a pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    /// Language outside the supported set
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// No code-generation rule for the pair
    #[error("translation from {from} to {to} is not supported")]
    UnsupportedPair {
        from: SourceLanguage,
        to: TargetLanguage,
    },

    /// No test template for the target
    #[error("no test template for {0}")]
    UnsupportedTarget(TargetLanguage),

    /// Parse result has nothing to test
    #[error("no testable functions in {source_file}")]
    NoTestableFunctions { source_file: String },

    /// Request failed validation
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Stage received a payload meant for another stage
    #[error("{stage} cannot handle {got} payloads")]
    UnexpectedPayload {
        stage: &'static str,
        got: &'static str,
    },

    /// Downstream send failed
    #[error("failed to forward to {to}: {reason}")]
    Forward { to: String, reason: String },
}

impl From<StageError> for HandlerError {
    fn from(err: StageError) -> Self {
        let message = err.to_string();
        match err {
            StageError::UnsupportedLanguage(_)
            | StageError::UnsupportedPair { .. }
            | StageError::UnsupportedTarget(_) => HandlerError::UnsupportedCapability(message),
            StageError::NoTestableFunctions { .. }
            | StageError::InvalidRequest(_)
            | StageError::UnexpectedPayload { .. } => HandlerError::Validation(message),
            StageError::Forward { .. } => HandlerError::Transient(message),
        }
    }
}

/// Errors loading or validating pipeline configuration
#[derive(Debug, thiserror::Error)]
pub enum PipelineConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigError),

    #[error("invalid telemetry config: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("stage ids must be distinct; {0} is used twice")]
    DuplicateStageId(String),
}

/// Errors from building or driving a [`crate::Pipeline`]
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] PipelineConfigError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Stage(#[from] StageError),
}
