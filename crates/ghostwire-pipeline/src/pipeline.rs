//! Wiring of the four stages onto an orchestrator

use crate::codegen::{CodegenEngine, RuleCodegen};
use crate::config::PipelineConfig;
use crate::error::{PipelineConfigError, PipelineError};
use crate::grammar::{GrammarEngine, RegexGrammar};
use crate::model::{ParseRequest, PipelinePayload};
use crate::stages::{ParserStage, RiskEvaluatorStage, TestGeneratorStage, TranslatorStage};
use crate::testgen::{TemplateSynthesizer, TestSynthesizer};
use ghostwire_core::{
    Agent, AgentErrorEvent, AgentIdentity, AgentMessage, Orchestrator, QueueMessageId,
};
use ghostwire_telemetry::{MetricsSink, NoopMetrics};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Builder for [`Pipeline`]
///
/// Every collaborator is optional; the bundled rule-based implementations
/// and [`NoopMetrics`] fill the gaps.
#[derive(Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    grammar: Option<Arc<dyn GrammarEngine>>,
    codegen: Option<Arc<dyn CodegenEngine>>,
    synthesizer: Option<Arc<dyn TestSynthesizer>>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn grammar(mut self, grammar: Arc<dyn GrammarEngine>) -> Self {
        self.grammar = Some(grammar);
        self
    }

    #[must_use]
    pub fn codegen(mut self, codegen: Arc<dyn CodegenEngine>) -> Self {
        self.codegen = Some(codegen);
        self
    }

    #[must_use]
    pub fn synthesizer(mut self, synthesizer: Arc<dyn TestSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate config and register the stage agents
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Invalid configuration or a failed registration.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        self.config.validate()?;
        let orchestrator = Orchestrator::new(self.config.orchestrator.clone())
            .map_err(PipelineConfigError::from)?;

        let ids = &self.config.stages;
        let review = &self.config.orchestrator.review_channel;
        let metrics = self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics));
        let grammar = self.grammar.unwrap_or_else(|| Arc::new(RegexGrammar::new()));
        let codegen = self.codegen.unwrap_or_else(|| Arc::new(RuleCodegen::new()));
        let synthesizer = self
            .synthesizer
            .unwrap_or_else(|| Arc::new(TemplateSynthesizer::new()));

        orchestrator.register(Agent::new(
            AgentIdentity::new(ids.parser.clone(), "Legacy Parser Agent")
                .with_capabilities(["legacy-parsing"]),
            ParserStage::new(grammar, Arc::clone(&metrics), ids.translator.clone()),
        ))?;
        orchestrator.register(Agent::new(
            AgentIdentity::new(ids.translator.clone(), "Code Translator Agent")
                .with_capabilities(["code-translation"]),
            TranslatorStage::new(
                codegen,
                Arc::clone(&metrics),
                ids.test_generator.clone(),
                ids.risk_evaluator.clone(),
            ),
        ))?;
        orchestrator.register(Agent::new(
            AgentIdentity::new(ids.test_generator.clone(), "Test Generator Agent")
                .with_capabilities(["test-generation"]),
            TestGeneratorStage::new(synthesizer, Arc::clone(&metrics), review.clone()),
        ))?;
        orchestrator.register(Agent::new(
            AgentIdentity::new(ids.risk_evaluator.clone(), "Risk Evaluator Agent")
                .with_capabilities(["risk-evaluation"]),
            RiskEvaluatorStage::new(metrics, review.clone()),
        ))?;

        Ok(Pipeline {
            config: self.config,
            orchestrator,
        })
    }
}

/// Parse, translate, test-generation and risk stages behind one orchestrator
pub struct Pipeline {
    config: PipelineConfig,
    orchestrator: Orchestrator<PipelinePayload>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.config.stages)
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}

impl Pipeline {
    #[inline]
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator<PipelinePayload> {
        &self.orchestrator
    }

    /// Start every stage and begin routing
    ///
    /// # Errors
    /// A stage whose start hook fails, or a pipeline that was stopped.
    pub async fn start(&self) -> Result<(), PipelineError> {
        self.orchestrator.start_all().await?;
        info!(stages = ?self.config.stages.all(), "Pipeline started");
        Ok(())
    }

    /// Queue a file for parsing
    ///
    /// The request is checked before queuing; an unsupported language is
    /// left for the parser to report as an error event.
    ///
    /// # Errors
    /// `StageError::InvalidRequest` for a malformed request, or an agent
    /// error if the pipeline is shut down.
    pub fn submit(&self, request: ParseRequest) -> Result<QueueMessageId, PipelineError> {
        request.validate()?;
        let message = AgentMessage::request(
            self.config.orchestrator.review_channel.clone(),
            self.config.stages.parser.clone(),
            PipelinePayload::Parse(request),
        );
        Ok(self.orchestrator.submit(message)?)
    }

    /// Stop routing and every stage; pending messages stay unprocessed
    ///
    /// # Errors
    /// The first stop-hook failure.
    pub async fn stop(&self) -> Result<(), PipelineError> {
        self.orchestrator.stop_all().await?;
        info!("Pipeline stopped");
        Ok(())
    }

    /// Review and test-suite notifications
    #[must_use]
    pub fn subscribe_review(&self) -> broadcast::Receiver<AgentMessage<PipelinePayload>> {
        self.orchestrator.subscribe_review()
    }

    /// Structured error events from every stage
    #[must_use]
    pub fn subscribe_errors(&self) -> broadcast::Receiver<AgentErrorEvent> {
        self.orchestrator.subscribe_errors()
    }
}
