//! Pipeline stage behaviours
//!
//! Each stage is an [`ghostwire_core::AgentBehavior`] over
//! [`PipelinePayload`]:
//!
//! ```text
//! parser -> translator -+-> test-generator -> review channel
//!                       +-> risk-evaluator -> review channel
//! ```

mod parser;
mod risk_evaluator;
mod test_generator;
mod translator;

pub use parser::ParserStage;
pub use risk_evaluator::RiskEvaluatorStage;
pub use test_generator::TestGeneratorStage;
pub use translator::TranslatorStage;

use crate::error::StageError;
use crate::model::PipelinePayload;
use ghostwire_core::{AgentContext, AgentId, AgentMemory, AgentMessage};
use ghostwire_telemetry::Tags;
use serde_json::{json, Value};
use std::time::Duration;

/// Memory keys written by the stages
pub mod memory_keys {
    pub const PARSED_FILES: &str = "parsed_files";
    pub const TOTAL_LINES_PROCESSED: &str = "total_lines_processed";
    pub const TRANSLATED_FILES: &str = "translated_files";
    pub const TOTAL_LINES_TRANSLATED: &str = "total_lines_translated";
    pub const GENERATED_SUITES: &str = "generated_suites";
    pub const EVALUATED_FILES: &str = "evaluated_files";
    pub const HIGH_RISK_COUNT: &str = "high_risk_count";
}

/// Metric names recorded by the stages
pub mod metric_names {
    pub const PARSER_SPEED: &str = "parser.speed";
    pub const TRANSLATION_SPEED: &str = "translation.speed";
    pub const TESTS_GENERATED: &str = "tests.generated";
    pub const RISK_SCORE: &str = "risk.score";
    pub const RISK_EVALUATION_TIME: &str = "risk.evaluation_time";
}

fn unexpected(stage: &'static str, payload: &PipelinePayload) -> StageError {
    StageError::UnexpectedPayload {
        stage,
        got: payload.kind(),
    }
}

/// Send a request downstream
fn forward(
    ctx: &AgentContext<PipelinePayload>,
    to: &AgentId,
    payload: PipelinePayload,
) -> Result<(), StageError> {
    ctx.request(to.clone(), payload)
        .map(|_| ())
        .map_err(|e| StageError::Forward {
            to: to.to_string(),
            reason: e.to_string(),
        })
}

/// Send a notification to the review channel
fn notify_review(
    ctx: &AgentContext<PipelinePayload>,
    review: &AgentId,
    payload: PipelinePayload,
) -> Result<(), StageError> {
    ctx.notify(review.clone(), payload)
        .map(|_| ())
        .map_err(|e| StageError::Forward {
            to: review.to_string(),
            reason: e.to_string(),
        })
}

/// Reset a list and a counter at stage start
fn init_memory(memory: &AgentMemory, list: &str, counter: Option<&str>) {
    memory.set(list, json!([]));
    if let Some(counter) = counter {
        memory.set(counter, json!(0));
    }
}

/// Append to a list kept in memory
fn push_entry(memory: &AgentMemory, key: &str, entry: &str) {
    let mut entries: Vec<String> = memory.get_as(key).unwrap_or_default();
    entries.push(entry.to_string());
    memory.set(key, json!(entries));
}

/// Throughput in lines per minute, guarding against a zero duration
#[allow(clippy::cast_precision_loss)]
fn lines_per_minute(lines: usize, elapsed: Duration) -> f64 {
    lines as f64 / elapsed.as_secs_f64().max(1e-6) * 60.0
}

fn tags<const N: usize>(pairs: [(&str, &str); N]) -> Tags {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// File names carried by a payload, for error-event context
fn payload_context(message: &AgentMessage<PipelinePayload>) -> Value {
    match message.body.payload() {
        Some(PipelinePayload::Parse(r)) => json!({ "source_file": r.source_file }),
        Some(PipelinePayload::Translate(r)) => json!({ "source_file": r.source_file }),
        Some(PipelinePayload::GenerateTests(r)) => json!({
            "source_file": r.source_file,
            "target_file": r.translation_result.target_file,
        }),
        Some(PipelinePayload::EvaluateRisk(r)) => {
            json!({ "target_file": r.translation_result.target_file })
        }
        Some(PipelinePayload::Review(n)) => json!({ "target_file": n.target_file }),
        Some(PipelinePayload::TestsGenerated(t)) => json!({ "target_file": t.target_file }),
        None => Value::Null,
    }
}
