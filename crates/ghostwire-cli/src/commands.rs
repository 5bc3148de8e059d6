//! Subcommand implementations
//!
//! Each command returns data; printing is left to `main`.

use anyhow::{Context, Result};
use ghostwire_core::{AgentErrorEvent, AgentMessage};
use ghostwire_pipeline::{
    EscalationGate, ParseRequest, Pipeline, PipelineConfig, PipelinePayload,
    ReviewNotification, RiskEvaluationRequest, Severity, SourceLanguage, TargetLanguage,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Config from `path`, or defaults
///
/// # Errors
/// Unreadable, malformed or invalid config.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

/// Effective config as TOML
///
/// # Errors
/// Serialization failure.
pub fn render_config(config: &PipelineConfig) -> Result<String> {
    toml::to_string_pretty(config).context("serializing config")
}

/// Read each file into a parse request
///
/// # Errors
/// Unreadable files, an unknown target, or a file whose language can be
/// neither detected nor taken from `language`.
pub fn prepare_requests(
    files: &[PathBuf],
    language: Option<&str>,
    target: Option<&str>,
) -> Result<Vec<ParseRequest>> {
    let target: Option<TargetLanguage> = target
        .map(str::parse)
        .transpose()
        .context("parsing --target")?;

    files
        .iter()
        .map(|path| {
            let display = path.to_string_lossy().into_owned();
            let language = match language {
                Some(language) => language.to_string(),
                None => SourceLanguage::from_extension(&display)
                    .map(|l| l.as_str().to_string())
                    .with_context(|| {
                        format!("cannot detect the language of {display}; pass --language")
                    })?,
            };
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("reading {display}"))?;
            let mut request = ParseRequest::new(display, source, language);
            request.target_language = target;
            Ok(request)
        })
        .collect()
}

/// Outcome of one file
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileSummary {
    pub source_file: String,
    pub target_file: Option<String>,
    pub score: Option<u8>,
    pub requires_review: Option<bool>,
    pub severity: Option<Severity>,
    pub tests: Option<usize>,
    pub errors: Vec<String>,
    #[serde(skip)]
    risk_done: bool,
    #[serde(skip)]
    tests_done: bool,
}

impl FileSummary {
    fn new(source_file: &str) -> Self {
        Self {
            source_file: source_file.to_string(),
            ..Self::default()
        }
    }

    /// Nothing more will arrive for this file
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.risk_done && self.tests_done
    }

    fn apply_verdict(&mut self, notification: &ReviewNotification) {
        self.target_file = Some(notification.target_file.clone());
        self.score = Some(notification.report.overall_score);
        self.requires_review = Some(notification.report.requires_human_review);
        self.severity = Some(notification.notice.severity);
        self.risk_done = true;
    }

    fn apply_error(&mut self, event: &AgentErrorEvent) {
        self.errors.push(format!(
            "{} ({}): {}",
            event.agent_id,
            event.tool_name.as_deref().unwrap_or("-"),
            event.error
        ));
        match event.tool_name.as_deref() {
            Some("generate_tests") => self.tests_done = true,
            Some("evaluate_risk") => self.risk_done = true,
            // Parse or translate failed: no downstream stage will run
            _ => {
                self.risk_done = true;
                self.tests_done = true;
            }
        }
    }
}

fn context_str<'a>(event: &'a AgentErrorEvent, key: &str) -> Option<&'a str> {
    event.context.get(key).and_then(serde_json::Value::as_str)
}

/// Index of summaries by source and expected target file
struct Tracker {
    summaries: Vec<FileSummary>,
    by_source: HashMap<String, usize>,
    by_target: HashMap<String, usize>,
}

impl Tracker {
    fn new(requests: &[ParseRequest]) -> Self {
        let mut by_source = HashMap::new();
        let mut by_target = HashMap::new();
        for (i, request) in requests.iter().enumerate() {
            by_source.insert(request.source_file.clone(), i);
            if let Ok(language) = request.source_language() {
                let target = request
                    .target_language
                    .unwrap_or_else(|| language.default_target());
                by_target.insert(target.target_path(&request.source_file), i);
            }
        }
        Self {
            summaries: requests
                .iter()
                .map(|r| FileSummary::new(&r.source_file))
                .collect(),
            by_source,
            by_target,
        }
    }

    fn settled(&self) -> bool {
        self.summaries.iter().all(FileSummary::is_settled)
    }

    fn on_review(&mut self, message: &AgentMessage<PipelinePayload>) {
        match message.body.payload() {
            Some(PipelinePayload::Review(notification)) => {
                if let Some(&i) = self.by_target.get(&notification.target_file) {
                    self.summaries[i].apply_verdict(notification);
                }
            }
            Some(PipelinePayload::TestsGenerated(generated)) => {
                if let Some(&i) = self.by_source.get(&generated.source_file) {
                    let summary = &mut self.summaries[i];
                    summary.tests = Some(generated.suite.test_count);
                    summary.tests_done = true;
                }
            }
            other => debug!(kind = ?other.map(PipelinePayload::kind), "Ignoring review message"),
        }
    }

    fn on_error(&mut self, event: &AgentErrorEvent) {
        let index = context_str(event, "source_file")
            .and_then(|f| self.by_source.get(f))
            .or_else(|| context_str(event, "target_file").and_then(|f| self.by_target.get(f)))
            .copied();
        match index {
            Some(i) => self.summaries[i].apply_error(event),
            None => warn!(agent = %event.agent_id, error = %event.error, "Unattributed error"),
        }
    }

    fn finish(mut self) -> Vec<FileSummary> {
        for summary in &mut self.summaries {
            if !summary.is_settled() {
                summary.errors.push("timed out".to_string());
            }
        }
        self.summaries
    }
}

/// Start the pipeline, submit every request and wait for the outcomes
///
/// The pipeline is stopped before returning, including on timeout.
///
/// # Errors
/// Start, submit or stop failures.
pub async fn run_pipeline(
    pipeline: &Pipeline,
    requests: Vec<ParseRequest>,
    timeout: Duration,
) -> Result<Vec<FileSummary>> {
    let mut tracker = Tracker::new(&requests);
    let mut reviews = pipeline.subscribe_review();
    let mut errors = pipeline.subscribe_errors();

    pipeline.start().await.context("starting pipeline")?;
    for request in requests {
        let source_file = request.source_file.clone();
        pipeline
            .submit(request)
            .with_context(|| format!("submitting {source_file}"))?;
    }

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    while !tracker.settled() {
        tokio::select! {
            message = reviews.recv() => match message {
                Ok(message) => tracker.on_review(&message),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Review channel lagged"),
                Err(RecvError::Closed) => break,
            },
            event = errors.recv() => match event {
                Ok(event) => tracker.on_error(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Error channel lagged"),
                Err(RecvError::Closed) => break,
            },
            () = &mut deadline => {
                warn!(timeout_secs = timeout.as_secs(), "Timed out waiting for pipeline");
                break;
            }
        }
    }

    pipeline.stop().await.context("stopping pipeline")?;
    Ok(tracker.finish())
}

/// Score a stored risk evaluation request
///
/// # Errors
/// Unreadable or malformed request file.
pub fn score_file(path: &Path) -> Result<ReviewNotification> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let request: RiskEvaluationRequest = serde_json::from_str(&text)
        .with_context(|| format!("parsing risk request {}", path.display()))?;
    let report = ghostwire_pipeline::risk::evaluate(&request);
    Ok(EscalationGate::new().route(report, &request.translation_result.target_file))
}

/// Human-readable run report
#[must_use]
pub fn render_summaries(summaries: &[FileSummary]) -> String {
    let mut out = String::new();
    for s in summaries {
        let _ = write!(out, "{}", s.source_file);
        if let Some(target) = &s.target_file {
            let _ = write!(out, " -> {target}");
        }
        if let (Some(score), Some(review)) = (s.score, s.requires_review) {
            let verdict = if review { "REVIEW" } else { "ok" };
            let _ = write!(out, "  score={score} [{verdict}]");
        }
        if let Some(tests) = s.tests {
            let _ = write!(out, "  tests={tests}");
        }
        out.push('\n');
        for error in &s.errors {
            let _ = writeln!(out, "    error: {error}");
        }
    }
    out
}

/// Human-readable score report
#[must_use]
pub fn render_notification(notification: &ReviewNotification) -> String {
    let report = &notification.report;
    let mut out = format!(
        "{}: score {} ({})\n",
        notification.target_file,
        report.overall_score,
        notification.event.as_str()
    );
    for factor in &report.risk_factors {
        let _ = writeln!(out, "  [{}] {}: {}", factor.severity, factor.category, factor.description);
    }
    for issue in &report.security_issues {
        let _ = writeln!(out, "  [{}] {}: {}", issue.severity, issue.kind, issue.description);
    }
    for warning in &report.performance_warnings {
        let _ = writeln!(out, "  [perf] {warning}");
    }
    out
}

/// Whether any file needs human review
#[must_use]
pub fn any_review(summaries: &[FileSummary]) -> bool {
    summaries.iter().any(|s| s.requires_review == Some(true))
}
