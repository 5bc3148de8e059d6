//! Testing utilities for the Ghostwire workspace
//!
//! Shared fixtures, recording metrics doubles and channel helpers.

#![allow(missing_docs)]

use async_trait::async_trait;
use ghostwire_core::{AgentErrorEvent, AgentMessage};
use ghostwire_pipeline::{
    FunctionInfo, LineMapping, ParseMetadata, ParseRequest, ParseResult, Pipeline,
    PipelineConfig, PipelinePayload, SourceLanguage, TargetLanguage, TranslationResult,
};
use ghostwire_telemetry::{Metric, MetricsSink, MetricsTransport, Tags, TelemetryError};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// One paragraph, no deprecated constructs
pub const HELLO_COBOL: &str = "       IDENTIFICATION DIVISION.
       PROGRAM-ID. HELLO.
       PROCEDURE DIVISION.
       MAIN-PARA.
           DISPLAY 'HELLO'.
           STOP RUN.
";

/// Two paragraphs using ALTER and GO TO
pub const LEGACY_COBOL: &str = "       IDENTIFICATION DIVISION.
       PROGRAM-ID. PAYROLL.
       PROCEDURE DIVISION.
       START-UP.
           CALL 'DATEUTIL' USING WS-DATE.
           ALTER CALC-PARA TO PROCEED TO FINISH.
           GO TO CALC-PARA.
       CALC-PARA.
           IF WS-HOURS > 40
               PERFORM OVERTIME
           END-IF.
       FINISH.
           STOP RUN.
";

pub const PASCAL_UNIT: &str = "program Calc;
uses SysUtils;
function Add(a, b: Integer): Integer;
begin
  Add := a + b;
end;
";

pub fn cobol_request(source_file: &str, source: &str) -> ParseRequest {
    ParseRequest::new(source_file, source, "COBOL")
}

pub fn parse_result(language: SourceLanguage, functions: &[&str]) -> ParseResult {
    ParseResult {
        language,
        functions: functions
            .iter()
            .enumerate()
            .map(|(i, name)| FunctionInfo {
                name: (*name).to_string(),
                parameters: Vec::new(),
                line_start: i * 4 + 1,
                line_end: i * 4 + 4,
            })
            .collect(),
        dependencies: Vec::new(),
        metadata: ParseMetadata {
            lines_of_code: functions.len() * 4,
            complexity: 1,
            deprecated_patterns: Default::default(),
        },
    }
}

/// Translation with one mapping per confidence
pub fn translation(target_file: &str, confidences: &[f64], code: &str) -> TranslationResult {
    TranslationResult {
        target_file: target_file.to_string(),
        target_language: TargetLanguage::Python,
        translated_code: code.to_string(),
        mappings: confidences
            .iter()
            .enumerate()
            .map(|(i, &confidence)| LineMapping {
                source_line: i + 1,
                target_line: i * 4 + 5,
                confidence,
            })
            .collect(),
        warnings: Vec::new(),
    }
}

/// Pipeline with default config reporting into a [`RecordingMetrics`]
pub fn setup_pipeline() -> (Pipeline, Arc<RecordingMetrics>) {
    setup_pipeline_with(PipelineConfig::default())
}

pub fn setup_pipeline_with(config: PipelineConfig) -> (Pipeline, Arc<RecordingMetrics>) {
    let metrics = Arc::new(RecordingMetrics::default());
    let pipeline = Pipeline::builder()
        .config(config)
        .metrics(metrics.clone())
        .build()
        .unwrap();
    (pipeline, metrics)
}

/// Sink that keeps every metric in memory
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    recorded: Mutex<Vec<Metric>>,
}

impl RecordingMetrics {
    pub fn recorded(&self) -> Vec<Metric> {
        self.recorded.lock().clone()
    }

    pub fn named(&self, name: &str) -> Vec<Metric> {
        self.recorded
            .lock()
            .iter()
            .filter(|m| m.name == name)
            .cloned()
            .collect()
    }
}

impl MetricsSink for RecordingMetrics {
    fn send_metric(&self, name: &str, value: f64, unit: Option<&str>, tags: Option<Tags>) {
        let mut metric = Metric::new(name, value).with_tags(tags.unwrap_or_default());
        if let Some(unit) = unit {
            metric = metric.with_unit(unit);
        }
        self.recorded.lock().push(metric);
    }
}

/// Transport that keeps delivered batches and can be switched to fail
#[derive(Debug, Default)]
pub struct RecordingTransport {
    batches: Mutex<Vec<Vec<Metric>>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<Vec<Metric>> {
        self.batches.lock().clone()
    }

    pub fn delivered(&self) -> Vec<Metric> {
        self.batches.lock().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl MetricsTransport for RecordingTransport {
    async fn send_batch(&self, batch: &[Metric]) -> Result<(), TelemetryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TelemetryError::Transport("transport offline".into()));
        }
        self.batches.lock().push(batch.to_vec());
        Ok(())
    }
}

/// Next review-channel message, skipping lagged notices
pub async fn next_review(
    rx: &mut broadcast::Receiver<AgentMessage<PipelinePayload>>,
) -> Option<PipelinePayload> {
    recv(rx, DEFAULT_TIMEOUT)
        .await
        .and_then(|message| message.body.payload().cloned())
}

/// Collect `count` review payloads or give up at the timeout
pub async fn collect_reviews(
    rx: &mut broadcast::Receiver<AgentMessage<PipelinePayload>>,
    count: usize,
) -> Vec<PipelinePayload> {
    let mut reviews = Vec::with_capacity(count);
    while reviews.len() < count {
        match next_review(rx).await {
            Some(payload) => reviews.push(payload),
            None => break,
        }
    }
    reviews
}

pub async fn next_error(rx: &mut broadcast::Receiver<AgentErrorEvent>) -> Option<AgentErrorEvent> {
    recv(rx, DEFAULT_TIMEOUT).await
}

async fn recv<T: Clone>(rx: &mut broadcast::Receiver<T>, timeout: Duration) -> Option<T> {
    tokio::time::timeout(timeout, async {
        loop {
            match rx.recv().await {
                Ok(item) => return Some(item),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Poll `condition` until it holds or the timeout passes
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition().await
}
