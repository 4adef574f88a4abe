//! Session-less lookup command.

use std::sync::Arc;

use console::style;

use rsannotate::config::Config;
use rsannotate::lookup::{EnsemblVepClient, LookupService};
use rsannotate::repository::MemoryStore;
use rsannotate::runner::BatchAnnotationRunner;

/// Look up identifiers one at a time and print what comes back.
pub async fn cmd_lookup(config: &Config, identifiers: &[String], json: bool) -> anyhow::Result<()> {
    let client = EnsemblVepClient::new(config.lookup.clone())?;
    if !json {
        println!(
            "{} Querying {} at {}",
            style("→").cyan(),
            client.name(),
            client.config().endpoint
        );
    }

    // Single lookups never touch a store; the in-memory one only satisfies the runner.
    let store = Arc::new(MemoryStore::new());
    let runner = BatchAnnotationRunner::new(
        store.clone(),
        store,
        Arc::new(client),
        config.annotation.runner_options(),
    )?;

    let mut all = Vec::new();
    for identifier in identifiers {
        match runner.lookup_single(identifier).await {
            Ok(results) if results.is_empty() => {
                if !json {
                    println!("{} {}: no annotation", style("!").yellow(), identifier);
                }
            }
            Ok(results) => {
                if !json {
                    for r in &results {
                        println!(
                            "{} {}  gene={}  transcript={}  consequence={}",
                            style("✓").green(),
                            r.identifier,
                            r.gene.as_deref().unwrap_or("-"),
                            r.transcript_id.as_deref().unwrap_or("-"),
                            r.consequence.as_deref().unwrap_or("-")
                        );
                    }
                }
                all.extend(results);
            }
            Err(e) => {
                eprintln!("{} {}: {}", style("✗").red(), identifier, e);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&all)?);
    }

    Ok(())
}
