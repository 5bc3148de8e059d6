use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ghostwire_cli::commands::{self, FileSummary};
use ghostwire_cli::{logging, Cli, Commands, ConfigAction, OutputFormat};
use ghostwire_pipeline::Pipeline;
use ghostwire_telemetry::{BufferedMetrics, TracingTransport};
use serde::Serialize;

/// Exit status when `--fail-on-review` is set and a file escalated
const REVIEW_REQUIRED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = commands::load_config(cli.config.as_deref())?;
    logging::init(&config.logging, cli.verbose, cli.log_json);

    match cli.command {
        Commands::Run {
            files,
            language,
            target,
            timeout_secs,
            fail_on_review,
        } => {
            let requests =
                commands::prepare_requests(&files, language.as_deref(), target.as_deref())?;

            let metrics = Arc::new(BufferedMetrics::new(
                config.telemetry,
                Arc::new(TracingTransport),
            )?);
            let flusher = metrics.spawn_auto_flush();
            let pipeline = Pipeline::builder()
                .config(config)
                .metrics(metrics)
                .build()
                .context("building pipeline")?;

            let summaries = commands::run_pipeline(
                &pipeline,
                requests,
                Duration::from_secs(timeout_secs),
            )
            .await;
            flusher.shutdown().await;
            let summaries = summaries?;

            print_summaries(cli.output, &summaries)?;
            if fail_on_review && commands::any_review(&summaries) {
                return Ok(ExitCode::from(REVIEW_REQUIRED));
            }
            let failed = summaries.iter().any(|s| !s.errors.is_empty());
            Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Commands::Score { request } => {
            let notification = commands::score_file(&request)?;
            match cli.output {
                OutputFormat::Text => print!("{}", commands::render_notification(&notification)),
                OutputFormat::Json => print_json(&notification)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { action } => {
            match action {
                ConfigAction::Show => print!("{}", commands::render_config(&config)?),
                ConfigAction::Validate => println!("config ok"),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_summaries(output: OutputFormat, summaries: &[FileSummary]) -> Result<()> {
    match output {
        OutputFormat::Text => print!("{}", commands::render_summaries(summaries)),
        OutputFormat::Json => print_json(&summaries)?,
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
