use super::memory_keys::{PARSED_FILES, TOTAL_LINES_PROCESSED};
use super::metric_names::PARSER_SPEED;
use super::{forward, init_memory, lines_per_minute, payload_context, push_entry, tags, unexpected};
use crate::grammar::GrammarEngine;
use crate::model::{PipelinePayload, TranslationRequest};
use async_trait::async_trait;
use ghostwire_core::{AgentBehavior, AgentContext, AgentId, AgentMessage, HandlerError};
use ghostwire_telemetry::MetricsSink;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Validates parse requests, runs the grammar and hands off to the translator
pub struct ParserStage {
    grammar: Arc<dyn GrammarEngine>,
    metrics: Arc<dyn MetricsSink>,
    translator: AgentId,
}

impl ParserStage {
    #[must_use]
    pub fn new(
        grammar: Arc<dyn GrammarEngine>,
        metrics: Arc<dyn MetricsSink>,
        translator: impl Into<AgentId>,
    ) -> Self {
        Self {
            grammar,
            metrics,
            translator: translator.into(),
        }
    }
}

#[async_trait]
impl AgentBehavior<PipelinePayload> for ParserStage {
    async fn on_start(&self, ctx: &AgentContext<PipelinePayload>) -> Result<(), HandlerError> {
        info!(agent = %ctx.id(), "Starting legacy parser");
        init_memory(ctx.memory(), PARSED_FILES, Some(TOTAL_LINES_PROCESSED));
        Ok(())
    }

    async fn on_stop(&self, ctx: &AgentContext<PipelinePayload>) -> Result<(), HandlerError> {
        info!(agent = %ctx.id(), "Stopping legacy parser");
        Ok(())
    }

    async fn on_request(
        &self,
        ctx: &AgentContext<PipelinePayload>,
        _from: &AgentId,
        payload: &PipelinePayload,
    ) -> Result<(), HandlerError> {
        let PipelinePayload::Parse(request) = payload else {
            return Err(unexpected("parser", payload).into());
        };
        request.validate()?;
        let language = request.source_language()?;
        let target_language = request
            .target_language
            .unwrap_or_else(|| language.default_target());

        let started = Instant::now();
        let parse_result = self.grammar.parse(language, &request.source_code).await?;
        let loc = parse_result.metadata.lines_of_code;

        self.metrics.send_metric(
            PARSER_SPEED,
            lines_per_minute(loc, started.elapsed()),
            Some("lines/min"),
            Some(tags([
                ("agent_id", ctx.id().as_str()),
                ("language", language.as_str()),
            ])),
        );
        push_entry(ctx.memory(), PARSED_FILES, &request.source_file);
        ctx.memory()
            .increment(TOTAL_LINES_PROCESSED, u64::try_from(loc).unwrap_or(u64::MAX));

        info!(
            source_file = %request.source_file,
            %language,
            functions = parse_result.functions.len(),
            loc,
            "Parsed"
        );

        forward(
            ctx,
            &self.translator,
            PipelinePayload::Translate(TranslationRequest {
                parse_result,
                source_file: request.source_file.clone(),
                language,
                target_language,
            }),
        )?;
        Ok(())
    }

    fn tool_name(&self) -> Option<&str> {
        Some("parse")
    }

    fn failure_context(&self, message: &AgentMessage<PipelinePayload>) -> serde_json::Value {
        payload_context(message)
    }
}
