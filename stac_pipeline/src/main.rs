// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # STAC Pipeline Engine — Entry Point
//!
//! Thin process entry point (spec.md §6): parses the CLI, loads and
//! validates a workflow document, runs it to completion, and reports the
//! result. All engine logic lives in the `application` module; this file
//! only wires `bootstrap` (CLI parsing, logging, signal handling, exit
//! codes) to it.

mod application;
mod infrastructure;

use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;
use std::sync::Arc;

use bootstrap::cli::{parse_cli, Commands, SecureArgParser};
use bootstrap::config::LogLevel;
use bootstrap::exit_code::ExitCode;
use bootstrap::logger::{self, OutputFormat};
use bootstrap::shutdown::CancellationToken;

use stac_pipeline_domain::entities::{ExecutionContext, LogLevelSetting, LogOutputFormat};
use stac_pipeline_domain::error::{EngineError, ErrorKind};
use stac_pipeline_domain::repositories::FailureCollector;
use stac_pipeline_domain::value_objects::WorkflowId;

use crate::application::workflow::dag;
use crate::application::workflow::engine::WorkflowEngine;
use crate::infrastructure::{workflow_loader, FileCheckpointManager, InMemoryFailureCollector};

#[tokio::main]
async fn main() -> ProcessExitCode {
    let cli = parse_cli();

    match cli.command.clone() {
        Commands::Run {
            workflow_file,
            resume,
            checkpoint_path,
        } => run_command(workflow_file, resume, checkpoint_path, cli.verbose, cli.log_format).await,
        Commands::Check { workflow_file } => check_command(workflow_file, cli.verbose, cli.log_format).await,
    }
}

fn output_format(cli_override: Option<String>, workflow_format: LogOutputFormat) -> OutputFormat {
    match cli_override.as_deref() {
        Some("json") => OutputFormat::Json,
        Some("text") => OutputFormat::Text,
        _ => match workflow_format {
            LogOutputFormat::Json => OutputFormat::Json,
            LogOutputFormat::Text => OutputFormat::Text,
        },
    }
}

fn log_level(verbose: bool, workflow_level: LogLevelSetting) -> LogLevel {
    if verbose {
        return LogLevel::Debug;
    }
    match workflow_level {
        LogLevelSetting::Debug => LogLevel::Debug,
        LogLevelSetting::Info => LogLevel::Info,
        LogLevelSetting::Warning => LogLevel::Warn,
        LogLevelSetting::Error => LogLevel::Error,
    }
}

/// Hardens the workflow-file path against traversal/injection before it
/// reaches the document loader (spec.md §6's "thin CLI surface" keeps this
/// as the one piece of input validation at the boundary).
fn validate_workflow_path(path: &PathBuf) -> Result<PathBuf, EngineError> {
    let raw = path.to_string_lossy().into_owned();
    SecureArgParser::validate_path(&raw).map_err(|e| EngineError::invalid_config(e.to_string()))
}

async fn check_command(workflow_file: PathBuf, verbose: bool, log_format: Option<String>) -> ProcessExitCode {
    // `check` validates before any logging level is known from the document,
    // so it always logs at Info unless --verbose overrides it.
    logger::init(log_level(verbose, LogLevelSetting::Info), output_format(log_format, LogOutputFormat::Text));

    let result = async {
        let path = validate_workflow_path(&workflow_file)?;
        let workflow = workflow_loader::load(&path).await?;
        dag::topological_order(&workflow.steps)?;
        Ok::<_, EngineError>(workflow)
    }
    .await;

    match result {
        Ok(workflow) => {
            tracing::info!("workflow '{}' is valid: {} step(s)", workflow.name, workflow.steps.len());
            println!("OK: workflow '{}' is valid ({} steps)", workflow.name, workflow.steps.len());
            exit_code_for(ExitCode::Success)
        }
        Err(err) => {
            tracing::error!("workflow validation failed: {err}");
            eprintln!("error: {err}");
            exit_code_for(exit_code_for_error(&err))
        }
    }
}

async fn run_command(
    workflow_file: PathBuf,
    resume: bool,
    checkpoint_path_override: Option<PathBuf>,
    verbose: bool,
    log_format: Option<String>,
) -> ProcessExitCode {
    // Bootstrap the subscriber at Info/text until the workflow document is
    // parsed and its own `settings.logging` can be honored.
    logger::init(log_level(verbose, LogLevelSetting::Info), output_format(log_format.clone(), LogOutputFormat::Text));

    let setup = async {
        let path = validate_workflow_path(&workflow_file)?;
        let workflow = workflow_loader::load(&path).await?;
        Ok::<_, EngineError>(workflow)
    }
    .await;

    let workflow = match setup {
        Ok(workflow) => workflow,
        Err(err) => {
            tracing::error!("configuration error: {err}");
            eprintln!("error: {err}");
            return exit_code_for(ExitCode::Config);
        }
    };

    // Re-initialize at the workflow document's configured level/format, now
    // that it is known (re-init is a documented no-op past the first call).
    logger::init(
        log_level(verbose, workflow.settings.logging.level),
        output_format(log_format, workflow.settings.logging.output_format),
    );

    let workflow_id = WorkflowId::generate();

    let checkpoint_path = checkpoint_path_override
        .or_else(|| workflow.settings.checkpoint.path.clone().map(PathBuf::from))
        .unwrap_or_else(|| default_checkpoint_path(&workflow_file));

    let checkpoint_manager = match FileCheckpointManager::open(checkpoint_path.clone(), workflow_id.as_str()).await {
        Ok(manager) => Arc::new(manager),
        Err(err) => {
            tracing::error!("failed to open checkpoint sidecar {}: {err}", checkpoint_path.display());
            eprintln!("error: {err}");
            return exit_code_for(ExitCode::Config);
        }
    };

    let failure_collector = Arc::new(InMemoryFailureCollector::new());

    // Only consult the sidecar's completed-steps list when the user passed
    // `--resume`; otherwise this run starts from scratch even if the
    // workflow document itself declares `checkpoint.enabled`.
    let mut workflow = workflow;
    workflow.settings.checkpoint.enabled = workflow.settings.checkpoint.enabled && resume;
    let workflow = Arc::new(workflow);

    let context = ExecutionContext::new(workflow_id, Arc::clone(&workflow), failure_collector.clone(), checkpoint_manager);

    let cancellation = CancellationToken::new();
    install_signal_forwarding(cancellation.clone());

    let engine = WorkflowEngine::new(context, cancellation);

    let summary = match engine.run().await {
        Ok(summary) => summary,
        Err(err) => {
            tracing::error!("workflow aborted: {err}");
            eprintln!("error: {err}");
            return exit_code_for(exit_code_for_error(&err));
        }
    };

    let failures = failure_collector.all().await;
    let report_path = failure_report_path(&checkpoint_path);
    if let Err(err) = write_failure_report(&report_path, &failures).await {
        tracing::error!("failed to write failure report {}: {err}", report_path.display());
    }

    tracing::info!("{}", summary.log_line());
    println!("{}", summary.log_line());
    println!("failure report: {}", report_path.display());

    if summary.is_success() {
        exit_code_for(ExitCode::Success)
    } else if summary.aborted {
        exit_code_for(ExitCode::Software)
    } else {
        exit_code_for(ExitCode::DataError)
    }
}

/// `<checkpoint-path>.failures.json`, per spec.md §6's "one file per
/// workflow run" failure report convention.
fn failure_report_path(checkpoint_path: &std::path::Path) -> PathBuf {
    let mut name = checkpoint_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".failures.json");
    checkpoint_path.with_file_name(name)
}

fn default_checkpoint_path(workflow_file: &std::path::Path) -> PathBuf {
    let stem = workflow_file.file_stem().and_then(|s| s.to_str()).unwrap_or("workflow");
    workflow_file.with_file_name(format!("{stem}.checkpoint.json"))
}

async fn write_failure_report(
    path: &std::path::Path,
    failures: &[stac_pipeline_domain::entities::FailureRecord],
) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let tmp_path = path.with_extension("tmp");
    let bytes = serde_json::to_vec_pretty(failures)?;
    tokio::fs::write(&tmp_path, &bytes).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Spawns the platform signal handler (SIGTERM/SIGINT/SIGHUP) and wires its
/// callback to `cancel()` the token the engine observes at every
/// suspension point (spec.md §5 cooperative cancellation).
fn install_signal_forwarding(cancellation: CancellationToken) {
    tokio::spawn(async move {
        let handler = bootstrap::signals::create_signal_handler();
        let callback: bootstrap::signals::ShutdownCallback = Box::new(move || cancellation.cancel());
        handler.wait_for_signal(callback).await;
    });
}

fn exit_code_for_error(err: &EngineError) -> ExitCode {
    match err.kind() {
        ErrorKind::Configuration => ExitCode::Config,
        ErrorKind::DataProcessing => ExitCode::DataError,
        ErrorKind::Unexpected => ExitCode::Software,
    }
}

fn exit_code_for(code: ExitCode) -> ProcessExitCode {
    ProcessExitCode::from(code.as_i32() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_report_path_appends_suffix_to_checkpoint_file_name() {
        let path = failure_report_path(std::path::Path::new("/tmp/run/wf.checkpoint.json"));
        assert_eq!(path, PathBuf::from("/tmp/run/wf.checkpoint.json.failures.json"));
    }

    #[test]
    fn default_checkpoint_path_is_derived_from_workflow_file_stem() {
        let path = default_checkpoint_path(std::path::Path::new("/workflows/ingest.yaml"));
        assert_eq!(path, PathBuf::from("/workflows/ingest.checkpoint.json"));
    }

    #[test]
    fn log_level_verbose_always_wins() {
        assert_eq!(log_level(true, LogLevelSetting::Error), LogLevel::Debug);
    }

    #[test]
    fn log_level_falls_back_to_workflow_setting() {
        assert_eq!(log_level(false, LogLevelSetting::Warning), LogLevel::Warn);
    }

    #[test]
    fn output_format_cli_override_wins_over_workflow_setting() {
        assert_eq!(output_format(Some("json".to_string()), LogOutputFormat::Text), OutputFormat::Json);
        assert_eq!(output_format(None, LogOutputFormat::Json), OutputFormat::Json);
    }

    #[test]
    fn exit_code_for_error_maps_each_kind() {
        assert_eq!(exit_code_for_error(&EngineError::invalid_config("x")), ExitCode::Config);
        assert_eq!(exit_code_for_error(&EngineError::QueryError("x".into())), ExitCode::DataError);
        assert_eq!(exit_code_for_error(&EngineError::InternalError("x".into())), ExitCode::Software);
    }
}
