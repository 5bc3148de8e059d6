use super::memory_keys::GENERATED_SUITES;
use super::metric_names::TESTS_GENERATED;
use super::{init_memory, notify_review, payload_context, push_entry, tags, unexpected};
use crate::model::{GeneratedTests, PipelinePayload};
use crate::testgen::TestSynthesizer;
use async_trait::async_trait;
use ghostwire_core::{AgentBehavior, AgentContext, AgentId, AgentMessage, HandlerError};
use ghostwire_telemetry::MetricsSink;
use std::sync::Arc;
use tracing::info;

/// Builds a test suite and delivers it to the review channel
pub struct TestGeneratorStage {
    synthesizer: Arc<dyn TestSynthesizer>,
    metrics: Arc<dyn MetricsSink>,
    review: AgentId,
}

impl TestGeneratorStage {
    #[must_use]
    pub fn new(
        synthesizer: Arc<dyn TestSynthesizer>,
        metrics: Arc<dyn MetricsSink>,
        review: impl Into<AgentId>,
    ) -> Self {
        Self {
            synthesizer,
            metrics,
            review: review.into(),
        }
    }
}

#[async_trait]
impl AgentBehavior<PipelinePayload> for TestGeneratorStage {
    async fn on_start(&self, ctx: &AgentContext<PipelinePayload>) -> Result<(), HandlerError> {
        info!(agent = %ctx.id(), "Starting test generator");
        init_memory(ctx.memory(), GENERATED_SUITES, None);
        Ok(())
    }

    async fn on_request(
        &self,
        ctx: &AgentContext<PipelinePayload>,
        _from: &AgentId,
        payload: &PipelinePayload,
    ) -> Result<(), HandlerError> {
        let PipelinePayload::GenerateTests(request) = payload else {
            return Err(unexpected("test generator", payload).into());
        };

        let suite = self.synthesizer.synthesize(request).await?;
        #[allow(clippy::cast_precision_loss)]
        let count = suite.test_count as f64;
        self.metrics.send_metric(
            TESTS_GENERATED,
            count,
            Some("tests"),
            Some(tags([
                ("agent_id", ctx.id().as_str()),
                ("target_language", suite.target_language.as_str()),
            ])),
        );
        push_entry(ctx.memory(), GENERATED_SUITES, &suite.test_file);

        info!(
            test_file = %suite.test_file,
            tests = suite.test_count,
            "Generated tests"
        );

        notify_review(
            ctx,
            &self.review,
            PipelinePayload::TestsGenerated(GeneratedTests {
                source_file: request.source_file.clone(),
                target_file: request.translation_result.target_file.clone(),
                suite,
            }),
        )?;
        Ok(())
    }

    fn tool_name(&self) -> Option<&str> {
        Some("generate_tests")
    }

    fn failure_context(&self, message: &AgentMessage<PipelinePayload>) -> serde_json::Value {
        payload_context(message)
    }
}
