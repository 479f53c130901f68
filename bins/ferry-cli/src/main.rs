//! # Ferry CLI - Transfer Planning Runner
//!
//! Parses the command line, wires the pipeline stages for the requested
//! verb, and maps the outcome onto the process exit code:
//! 0 success, 1 error, 2 no transfers scheduled, 3 cancelled.
//!
//! ## Usage
//!
//! ```bash
//! # Copy a container down to a local directory
//! ferry copy 'https://acct.blob.core.windows.net/c/*' /tmp/out --recursive
//!
//! # Keep a container in step with a local tree
//! ferry sync /data https://acct.blob.core.windows.net/backup --delete-destination=true
//!
//! # Inspect and manage jobs
//! ferry jobs list
//! ferry resume 5a8f1f86-...-09ab
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ferry_core::{
    ExitKind, FerryError, LifecycleManager, Prompter, TransferAction,
    lifecycle::{PresetPrompter, PromptReply, StdinPrompter},
};
use ferry_jobs::{FilePlanStore, PidGuard, PlanStore};

mod args;
mod cook;
mod jobs_cmd;
mod list_cmd;
mod run;

use args::{Cli, Command, JobsCommand};
use run::JobContext;

fn init_tracing(log_level: &str) {
    let directive = match log_level.to_ascii_uppercase().as_str() {
        "NONE" => "off".to_string(),
        "WARNING" => "warn".to_string(),
        other => other.to_ascii_lowercase(),
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directive));
    // A plain-text copy of the diagnostics lands next to the job plans when
    // a log location is configured.
    let file_layer = std::env::var_os("FERRY_LOG_LOCATION").and_then(|dir| {
        let dir = PathBuf::from(dir);
        std::fs::create_dir_all(&dir).ok()?;
        let file = std::fs::File::create(dir.join("ferry.log")).ok()?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
    });
    // Keep stdout clean for NDJSON; diagnostics go to stderr.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
}

fn app_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(".ferry"),
        _ => std::env::temp_dir().join("ferry"),
    }
}

fn plan_dir() -> PathBuf {
    match std::env::var_os("FERRY_JOB_PLAN_LOCATION") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => app_dir().join("plans"),
    }
}

fn command_line() -> String {
    std::env::args().collect::<Vec<_>>().join(" ")
}

async fn read_list_file(path: Option<&Path>) -> Result<Option<Vec<String>>, FerryError> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        FerryError::InvalidArgument(format!("cannot read list file {}: {e}", path.display()))
    })?;
    Ok(Some(
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect(),
    ))
}

/// A cancellation token that fires on Ctrl-C, shared by every stage of the
/// job.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            eprintln!("\ncancelling, waiting for in-flight work to settle...");
            trigger.cancel();
        }
    });
    cancel
}

async fn dispatch(cli: Cli, lifecycle: Arc<LifecycleManager>) -> Result<ExitKind, FerryError> {
    let store: Arc<dyn PlanStore> = Arc::new(FilePlanStore::new(plan_dir()));
    let command = command_line();
    match cli.command {
        Command::Copy(cmd) => {
            let _guard = PidGuard::acquire(&app_dir().join("pids"))?;
            let cooked = cook::cook_copy(&cmd, cli.cap_mbps)?;
            let list_entries = read_list_file(cmd.list_of_files.as_deref()).await?;
            let ctx = JobContext {
                lifecycle,
                store,
                cancel: cancel_on_ctrl_c(),
            };
            run::run_copy_or_remove(
                cooked,
                TransferAction::Copy,
                list_entries,
                None,
                &ctx,
                command,
            )
            .await
        }
        Command::Sync(cmd) => {
            let _guard = PidGuard::acquire(&app_dir().join("pids"))?;
            let cooked = cook::cook_sync(&cmd, cli.cap_mbps)?;
            let sync = run::SyncConfig {
                compare_hash: cmd.compare_hash,
                mirror_mode: cmd.mirror_mode,
            };
            let ctx = JobContext {
                lifecycle,
                store,
                cancel: cancel_on_ctrl_c(),
            };
            run::run_sync(cooked, sync, &ctx, command).await
        }
        Command::Remove(cmd) => {
            let _guard = PidGuard::acquire(&app_dir().join("pids"))?;
            let cooked = cook::cook_remove(&cmd, cli.cap_mbps)?;
            let list_entries = read_list_file(cmd.list_of_files.as_deref()).await?;
            let version_entries = read_list_file(cmd.list_of_versions.as_deref()).await?;
            let ctx = JobContext {
                lifecycle,
                store,
                cancel: cancel_on_ctrl_c(),
            };
            run::run_copy_or_remove(
                cooked,
                TransferAction::Remove,
                list_entries,
                version_entries,
                &ctx,
                command,
            )
            .await
        }
        Command::Resume(cmd) => {
            let _guard = PidGuard::acquire(&app_dir().join("pids"))?;
            jobs_cmd::run_resume(store.as_ref(), &lifecycle, &cmd)
        }
        Command::Cancel { job_id } => jobs_cmd::run_cancel(store.as_ref(), &lifecycle, &job_id),
        Command::Jobs { command } => match command {
            JobsCommand::List { with_status } => {
                jobs_cmd::run_jobs_list(store.as_ref(), &lifecycle, with_status.as_deref())
            }
            JobsCommand::Show {
                job_id,
                with_status,
            } => jobs_cmd::run_jobs_show(
                store.as_ref(),
                &lifecycle,
                &job_id,
                with_status.as_deref(),
            ),
        },
        Command::List(cmd) => {
            let cancel = cancel_on_ctrl_c();
            list_cmd::run_list(&cmd, lifecycle, &cancel).await
        }
        Command::Bench(cmd) => {
            let _guard = PidGuard::acquire(&app_dir().join("pids"))?;
            let cancel = cancel_on_ctrl_c();
            list_cmd::run_bench(&cmd, lifecycle, &cancel).await
        }
        Command::Env => {
            list_cmd::run_env(&lifecycle);
            Ok(ExitKind::Success)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    debug!(?cli, "parsed arguments");

    // Prompts need a terminal; headless runs decline destructive questions.
    let prompter: Box<dyn Prompter> = if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        Box::new(StdinPrompter)
    } else {
        Box::new(PresetPrompter(PromptReply::No))
    };
    let lifecycle = Arc::new(LifecycleManager::new(
        cli.output_type,
        cli.output_level,
        prompter,
    ));

    let code = match dispatch(cli, lifecycle.clone()).await {
        Ok(kind) => {
            lifecycle.signal_exit(kind);
            lifecycle.exit_kind().code()
        }
        Err(err) => {
            let kind = if err.is_cancellation() {
                ExitKind::Cancelled
            } else {
                ExitKind::Error
            };
            lifecycle.error_line(&format!("ferry: {err}"));
            kind.code()
        }
    };
    std::process::exit(code);
}
