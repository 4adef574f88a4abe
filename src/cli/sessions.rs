//! Session inspection commands.

use console::style;

use rsannotate::config::Settings;
use rsannotate::repository::{ResultStore, SessionStore};

use super::helpers::{open_database, styled_status, truncate};

/// List the owner's sessions, newest first.
pub async fn cmd_sessions(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_database(settings).await?;
    let sessions = ctx.sessions().list_sessions(&settings.owner).await?;

    if sessions.is_empty() {
        println!("{} No sessions for {}", style("!").yellow(), settings.owner);
        return Ok(());
    }

    println!(
        "{:<36}  {:<11}  {:>13}  {:<20}  {}",
        "ID", "STATUS", "PROGRESS", "CREATED", "SOURCE"
    );
    for session in sessions {
        let progress = format!("{}/{}", session.processed_count, session.total_items);
        println!(
            "{:<36}  {:<11}  {:>13}  {:<20}  {}",
            session.id,
            styled_status(session.status),
            progress,
            session.created_at.format("%Y-%m-%d %H:%M:%S"),
            truncate(&session.source_name, 40)
        );
    }

    Ok(())
}

/// Show one session.
pub async fn cmd_status(settings: &Settings, session_id: &str) -> anyhow::Result<()> {
    let ctx = open_database(settings).await?;
    let Some(session) = ctx.sessions().read_session(session_id).await? else {
        anyhow::bail!("Session not found: {}", session_id);
    };
    let result_count = ctx.results().count(session_id).await?;

    println!("{}", style(&session.id).bold());
    println!("  Source:    {}", session.source_name);
    println!("  Owner:     {}", session.owner_id);
    println!("  Status:    {}", styled_status(session.status));
    println!(
        "  Progress:  {}/{} ({:.1}%)",
        session.processed_count,
        session.total_items,
        session.progress() * 100.0
    );
    println!("  Results:   {}", result_count);
    println!("  Created:   {}", session.created_at.to_rfc3339());
    println!("  Updated:   {}", session.updated_at.to_rfc3339());

    Ok(())
}

/// Print stored results for a session.
pub async fn cmd_results(settings: &Settings, session_id: &str, json: bool) -> anyhow::Result<()> {
    let ctx = open_database(settings).await?;
    if ctx.sessions().read_session(session_id).await?.is_none() {
        anyhow::bail!("Session not found: {}", session_id);
    }
    let results = ctx.results().list_results(session_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("{} No results stored for {}", style("!").yellow(), session_id);
        return Ok(());
    }

    println!(
        "{:<14}  {:<12}  {:<18}  {}",
        "IDENTIFIER", "GENE", "TRANSCRIPT", "CONSEQUENCE"
    );
    for result in &results {
        println!(
            "{:<14}  {:<12}  {:<18}  {}",
            result.identifier,
            result.gene.as_deref().unwrap_or("-"),
            result.transcript_id.as_deref().unwrap_or("-"),
            result.consequence.as_deref().unwrap_or("-")
        );
    }
    println!("{} {} results", style("→").dim(), results.len());

    Ok(())
}
