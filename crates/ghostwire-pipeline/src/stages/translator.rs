use super::memory_keys::{TOTAL_LINES_TRANSLATED, TRANSLATED_FILES};
use super::metric_names::TRANSLATION_SPEED;
use super::{forward, init_memory, lines_per_minute, payload_context, push_entry, tags, unexpected};
use crate::codegen::CodegenEngine;
use crate::error::StageError;
use crate::model::{
    PipelinePayload, RiskEvaluationRequest, TestGenerationRequest, TranslationRequest,
};
use async_trait::async_trait;
use ghostwire_core::{
    AgentBehavior, AgentContext, AgentErrorEvent, AgentId, AgentMessage, HandlerError,
};
use ghostwire_telemetry::MetricsSink;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Generates target code and fans out to test generation and risk evaluation
///
/// The two hand-offs are independent: when one fails it is reported as an
/// error event and the other still goes out. Only when both fail does the
/// handler itself fail.
pub struct TranslatorStage {
    codegen: Arc<dyn CodegenEngine>,
    metrics: Arc<dyn MetricsSink>,
    test_generator: AgentId,
    risk_evaluator: AgentId,
}

impl TranslatorStage {
    #[must_use]
    pub fn new(
        codegen: Arc<dyn CodegenEngine>,
        metrics: Arc<dyn MetricsSink>,
        test_generator: impl Into<AgentId>,
        risk_evaluator: impl Into<AgentId>,
    ) -> Self {
        Self {
            codegen,
            metrics,
            test_generator: test_generator.into(),
            risk_evaluator: risk_evaluator.into(),
        }
    }
}

#[async_trait]
impl AgentBehavior<PipelinePayload> for TranslatorStage {
    async fn on_start(&self, ctx: &AgentContext<PipelinePayload>) -> Result<(), HandlerError> {
        info!(agent = %ctx.id(), "Starting code translator");
        init_memory(ctx.memory(), TRANSLATED_FILES, Some(TOTAL_LINES_TRANSLATED));
        Ok(())
    }

    async fn on_stop(&self, ctx: &AgentContext<PipelinePayload>) -> Result<(), HandlerError> {
        info!(agent = %ctx.id(), "Stopping code translator");
        Ok(())
    }

    async fn on_request(
        &self,
        ctx: &AgentContext<PipelinePayload>,
        _from: &AgentId,
        payload: &PipelinePayload,
    ) -> Result<(), HandlerError> {
        let PipelinePayload::Translate(request) = payload else {
            return Err(unexpected("translator", payload).into());
        };
        let TranslationRequest {
            parse_result,
            source_file,
            language,
            target_language,
        } = request;
        if parse_result.language != *language {
            return Err(StageError::InvalidRequest(format!(
                "request language {language} does not match parsed {}",
                parse_result.language
            ))
            .into());
        }

        let started = Instant::now();
        let translation = self
            .codegen
            .translate(parse_result, source_file, *target_language)
            .await?;
        let loc = parse_result.metadata.lines_of_code;

        self.metrics.send_metric(
            TRANSLATION_SPEED,
            lines_per_minute(loc, started.elapsed()),
            Some("lines/min"),
            Some(tags([
                ("agent_id", ctx.id().as_str()),
                ("source_language", language.as_str()),
                ("target_language", target_language.as_str()),
            ])),
        );
        push_entry(ctx.memory(), TRANSLATED_FILES, &translation.target_file);
        ctx.memory()
            .increment(TOTAL_LINES_TRANSLATED, u64::try_from(loc).unwrap_or(u64::MAX));

        info!(
            source_file = %source_file,
            target_file = %translation.target_file,
            mappings = translation.mappings.len(),
            warnings = translation.warnings.len(),
            "Translated"
        );

        let target_file = translation.target_file.clone();
        let tests = forward(
            ctx,
            &self.test_generator,
            PipelinePayload::GenerateTests(TestGenerationRequest {
                translation_result: translation.clone(),
                parse_result: parse_result.clone(),
                source_file: source_file.clone(),
            }),
        );
        let risk = forward(
            ctx,
            &self.risk_evaluator,
            PipelinePayload::EvaluateRisk(RiskEvaluationRequest {
                translation_result: translation,
                parse_result: parse_result.clone(),
            }),
        );

        match (tests, risk) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(failed), Ok(())) | (Ok(()), Err(failed)) => {
                warn!(%target_file, error = %failed, "Partial fan-out");
                let error: HandlerError = failed.into();
                ctx.report_error(
                    AgentErrorEvent::from_handler(ctx.id().clone(), &error)
                        .with_tool(Some("translate".to_string()))
                        .with_context(json!({
                            "source_file": source_file,
                            "target_file": target_file,
                        })),
                );
                Ok(())
            }
            (Err(failed), Err(_)) => Err(failed.into()),
        }
    }

    fn tool_name(&self) -> Option<&str> {
        Some("translate")
    }

    fn failure_context(&self, message: &AgentMessage<PipelinePayload>) -> serde_json::Value {
        payload_context(message)
    }
}
