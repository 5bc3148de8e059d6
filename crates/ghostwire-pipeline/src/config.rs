//! Pipeline configuration
//!
//! Loaded from TOML; every section and field is optional:
//!
//! ```toml
//! [orchestrator]
//! review_channel = "orchestrator"
//! max_attempts = 3
//!
//! [orchestrator.retry]
//! policy = "exponential"
//! base_ms = 100
//! max_ms = 2000
//!
//! [telemetry]
//! flush_interval_ms = 5000
//! buffer_limit = 100
//!
//! [logging]
//! level = "info"
//! json = false
//!
//! [stages]
//! parser = "legacy-parser"
//! ```

use crate::error::PipelineConfigError;
use ghostwire_core::{AgentId, OrchestratorConfig};
use ghostwire_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Agent ids of the four stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageIds {
    pub parser: AgentId,
    pub translator: AgentId,
    pub test_generator: AgentId,
    pub risk_evaluator: AgentId,
}

impl Default for StageIds {
    fn default() -> Self {
        Self {
            parser: AgentId::new("legacy-parser"),
            translator: AgentId::new("code-translator"),
            test_generator: AgentId::new("test-generator"),
            risk_evaluator: AgentId::new("risk-evaluator"),
        }
    }
}

impl StageIds {
    /// In pipeline order
    #[must_use]
    pub fn all(&self) -> [&AgentId; 4] {
        [
            &self.parser,
            &self.translator,
            &self.test_generator,
            &self.risk_evaluator,
        ]
    }
}

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub orchestrator: OrchestratorConfig,
    pub telemetry: TelemetryConfig,
    pub logging: LoggingConfig,
    pub stages: StageIds,
}

impl PipelineConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_orchestrator(mut self, orchestrator: OrchestratorConfig) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    #[must_use]
    pub fn with_telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.telemetry = telemetry;
        self
    }

    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    #[must_use]
    pub fn with_stages(mut self, stages: StageIds) -> Self {
        self.stages = stages;
        self
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// Parse failures or any [`PipelineConfig::validate`] error.
    pub fn from_toml_str(text: &str) -> Result<Self, PipelineConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// `PipelineConfigError::Io` when the file cannot be read, otherwise as
    /// [`PipelineConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PipelineConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check every section
    ///
    /// # Errors
    /// The first invalid section, or a stage id that is reused or collides
    /// with the review channel.
    pub fn validate(&self) -> Result<(), PipelineConfigError> {
        self.orchestrator.validate()?;
        self.telemetry.validate()?;

        let mut seen: Vec<&AgentId> = vec![&self.orchestrator.review_channel];
        for id in self.stages.all() {
            if seen.contains(&id) {
                return Err(PipelineConfigError::DuplicateStageId(id.to_string()));
            }
            seen.push(id);
        }
        Ok(())
    }
}
