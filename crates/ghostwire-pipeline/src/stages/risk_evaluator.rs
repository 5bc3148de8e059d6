use super::memory_keys::{EVALUATED_FILES, HIGH_RISK_COUNT};
use super::metric_names::{RISK_EVALUATION_TIME, RISK_SCORE};
use super::{init_memory, notify_review, payload_context, push_entry, tags, unexpected};
use crate::model::PipelinePayload;
use crate::risk::{self, EscalationGate, REVIEW_THRESHOLD};
use async_trait::async_trait;
use ghostwire_core::{AgentBehavior, AgentContext, AgentId, AgentMessage, HandlerError};
use ghostwire_telemetry::MetricsSink;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Scores a translation and routes the verdict to the review channel
pub struct RiskEvaluatorStage {
    gate: EscalationGate,
    metrics: Arc<dyn MetricsSink>,
    review: AgentId,
}

impl RiskEvaluatorStage {
    #[must_use]
    pub fn new(metrics: Arc<dyn MetricsSink>, review: impl Into<AgentId>) -> Self {
        Self {
            gate: EscalationGate::new(),
            metrics,
            review: review.into(),
        }
    }
}

#[async_trait]
impl AgentBehavior<PipelinePayload> for RiskEvaluatorStage {
    async fn on_start(&self, ctx: &AgentContext<PipelinePayload>) -> Result<(), HandlerError> {
        info!(agent = %ctx.id(), "Starting risk evaluator");
        init_memory(ctx.memory(), EVALUATED_FILES, Some(HIGH_RISK_COUNT));
        Ok(())
    }

    async fn on_stop(&self, ctx: &AgentContext<PipelinePayload>) -> Result<(), HandlerError> {
        info!(agent = %ctx.id(), "Stopping risk evaluator");
        Ok(())
    }

    async fn on_request(
        &self,
        ctx: &AgentContext<PipelinePayload>,
        _from: &AgentId,
        payload: &PipelinePayload,
    ) -> Result<(), HandlerError> {
        let PipelinePayload::EvaluateRisk(request) = payload else {
            return Err(unexpected("risk evaluator", payload).into());
        };
        let target_file = &request.translation_result.target_file;

        let started = Instant::now();
        let report = risk::evaluate(request);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let score = report.overall_score;

        let language = request.parse_result.language.as_str();
        self.metrics.send_metric(
            RISK_SCORE,
            f64::from(score),
            Some("score"),
            Some(tags([
                ("agent_id", ctx.id().as_str()),
                ("language", language),
                ("target_file", target_file.as_str()),
            ])),
        );
        self.metrics.send_metric(
            RISK_EVALUATION_TIME,
            elapsed_ms,
            Some("ms"),
            Some(tags([("agent_id", ctx.id().as_str()), ("language", language)])),
        );

        push_entry(ctx.memory(), EVALUATED_FILES, target_file);
        if score > REVIEW_THRESHOLD {
            ctx.memory().increment(HIGH_RISK_COUNT, 1);
        }

        info!(
            %target_file,
            score,
            factors = report.risk_factors.len(),
            issues = report.security_issues.len(),
            review = report.requires_human_review,
            "Risk evaluated"
        );

        let notification = self.gate.route(report, target_file);
        notify_review(ctx, &self.review, PipelinePayload::Review(notification))?;
        Ok(())
    }

    fn tool_name(&self) -> Option<&str> {
        Some("evaluate_risk")
    }

    fn failure_context(&self, message: &AgentMessage<PipelinePayload>) -> serde_json::Value {
        payload_context(message)
    }
}
