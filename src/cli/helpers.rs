//! Shared helper functions for CLI commands.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use console::{style, StyledObject};

use rsannotate::config::{Config, Settings};
use rsannotate::lookup::EnsemblVepClient;
use rsannotate::models::SessionStatus;
use rsannotate::repository::DbContext;
use rsannotate::runner::BatchAnnotationRunner;

/// Truncate to `max` characters, marking the cut with "...".
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn styled_status(status: SessionStatus) -> StyledObject<&'static str> {
    match status {
        SessionStatus::InProgress => style(status.as_str()).cyan(),
        SessionStatus::Paused => style(status.as_str()).yellow(),
        SessionStatus::Completed => style(status.as_str()).green(),
    }
}

/// Open the configured database, applying any pending migrations.
pub async fn open_database(settings: &Settings) -> anyhow::Result<DbContext> {
    if !settings.database_exists() {
        anyhow::bail!(
            "No database at {}. Run `rsanno init` first.",
            settings.database_url()
        );
    }
    let ctx = settings
        .create_db_context()
        .map_err(anyhow::Error::msg)?;
    ctx.migrate().await?;
    Ok(ctx)
}

/// Read a file and extract its distinct identifiers.
pub async fn read_identifiers(path: &Path, config: &Config) -> anyhow::Result<BTreeSet<String>> {
    let extractor = config
        .annotation
        .extractor()
        .context("Invalid annotation.identifier_pattern")?;
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(extractor.extract(&content))
}

/// Build a runner over the SQLite stores and the configured lookup service.
pub fn build_runner(
    ctx: &DbContext,
    config: &Config,
    batch_size: Option<usize>,
) -> anyhow::Result<BatchAnnotationRunner> {
    let mut options = config.annotation.runner_options();
    if let Some(size) = batch_size {
        options.batch_size = size;
    }

    let lookup = EnsemblVepClient::new(config.lookup.clone())?;
    let (sessions, results) = ctx.stores();
    Ok(BatchAnnotationRunner::new(
        sessions,
        results,
        Arc::new(lookup),
        options,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("genome.txt", 20), "genome.txt");
        assert_eq!(truncate("a_very_long_file_name.txt", 10), "a_very_...");
        assert_eq!(truncate("ääääää", 5), "ää...");
    }
}
