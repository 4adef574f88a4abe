//! Annotate and resume commands.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use rsannotate::config::{Config, Settings};
use rsannotate::models::SessionStatus;
use rsannotate::runner::{BatchAnnotationRunner, RunEvent, RunSummary, RunnerError};

use super::helpers::{build_runner, open_database, read_identifiers, styled_status, truncate};

/// Create a session for `file` and run it.
pub async fn cmd_annotate(
    settings: &Settings,
    config: &Config,
    file: &Path,
    name: Option<String>,
    batch_size: Option<usize>,
) -> anyhow::Result<()> {
    let identifiers = read_identifiers(file, config).await?;
    if identifiers.is_empty() {
        println!(
            "{} No identifiers found in {}",
            style("!").yellow(),
            file.display()
        );
        return Ok(());
    }

    let ctx = open_database(settings).await?;
    let runner = Arc::new(build_runner(&ctx, config, batch_size)?);

    let source_name = name.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string())
    });
    let session = runner
        .create_session(&settings.owner, &source_name, &identifiers)
        .await?;

    println!(
        "{} Session {} created for {} ({} identifiers)",
        style("✓").green(),
        style(&session.id).bold(),
        source_name,
        session.total_items
    );

    drive(runner, session.id, identifiers).await
}

/// Resume a paused session from the file it was created with.
pub async fn cmd_resume(
    settings: &Settings,
    config: &Config,
    session_id: &str,
    file: &Path,
    batch_size: Option<usize>,
) -> anyhow::Result<()> {
    let identifiers = read_identifiers(file, config).await?;
    let ctx = open_database(settings).await?;
    let runner = Arc::new(build_runner(&ctx, config, batch_size)?);

    drive(runner, session_id.to_string(), identifiers).await
}

/// Run a session with a progress bar; Ctrl-C pauses after the current batch.
async fn drive(
    runner: Arc<BatchAnnotationRunner>,
    session_id: String,
    identifiers: BTreeSet<String>,
) -> anyhow::Result<()> {
    let (event_tx, mut event_rx) = mpsc::channel::<RunEvent>(100);

    let event_handler = tokio::spawn(async move {
        let mut pb: Option<ProgressBar> = None;
        while let Some(event) = event_rx.recv().await {
            match event {
                RunEvent::Started {
                    total_items,
                    processed_count,
                    remaining,
                    batches,
                    ..
                } => {
                    let progress = ProgressBar::new(total_items);
                    if let Ok(bar_style) = ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
                    {
                        progress.set_style(bar_style.progress_chars("█▓░"));
                    }
                    progress.set_position(processed_count);
                    progress.set_message(format!("{} remaining in {} batches", remaining, batches));
                    pb = Some(progress);
                }
                RunEvent::IdentifierMismatch { .. } => {
                    println!(
                        "{} File differs from the one this session was created with",
                        style("!").yellow()
                    );
                }
                RunEvent::BatchStarted { index, size } => {
                    if let Some(ref progress) = pb {
                        progress.set_message(format!("batch {} ({} ids)", index + 1, size));
                    }
                }
                RunEvent::BatchCompleted { .. } => {}
                RunEvent::BatchFailed {
                    index,
                    identifiers,
                    error,
                } => {
                    if let Some(ref progress) = pb {
                        progress.println(format!(
                            "{} batch {} failed ({} ids): {}",
                            style("✗").red(),
                            index + 1,
                            identifiers.len(),
                            truncate(&error, 80)
                        ));
                    }
                }
                RunEvent::Progress {
                    processed_count, ..
                } => {
                    if let Some(ref progress) = pb {
                        progress.set_position(processed_count);
                    }
                }
                RunEvent::Finished { .. } => {
                    if let Some(progress) = pb.take() {
                        progress.finish_and_clear();
                    }
                }
            }
        }
    });

    let pause_handle = {
        let runner = runner.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!(
                    "{} Pausing after the current batch...",
                    style("→").cyan()
                );
                runner.pause(&session_id);
            }
        })
    };

    let outcome = runner.start(&session_id, &identifiers, event_tx).await;
    pause_handle.abort();
    let _ = event_handler.await;

    match outcome {
        Ok(summary) => print_summary(&summary),
        Err(RunnerError::NothingToProcess) => {
            println!("{} No identifiers found in input", style("!").yellow());
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    if summary.is_idle() && summary.status == SessionStatus::Completed {
        println!(
            "{} Session {} is already completed",
            style("✓").green(),
            summary.session_id
        );
        return;
    }

    println!(
        "{} Session {}: {} ({}/{} processed, {} results stored this run)",
        style("✓").green(),
        summary.session_id,
        styled_status(summary.status),
        summary.processed_count,
        summary.total_items,
        summary.results_stored
    );

    if summary.batches_failed > 0 {
        println!(
            "  {} {} batches failed; {} identifiers will be retried on resume",
            style("!").yellow(),
            summary.batches_failed,
            summary.failed_identifiers.len()
        );
    }
    if summary.status == SessionStatus::Paused {
        println!(
            "  {} rsanno resume {} <file>",
            style("→").dim(),
            summary.session_id
        );
    }
}
