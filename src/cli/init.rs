//! Initialize command.

use console::style;

use rsannotate::config::{Config, Settings};

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    if settings.database_url.is_none() {
        settings.ensure_directories()?;
    }

    let ctx = settings
        .create_db_context()
        .map_err(anyhow::Error::msg)?;
    let applied = ctx.migrate().await?;

    for name in &applied {
        println!("  {} Applied migration {}", style("✓").green(), name);
    }

    match config.source_path {
        Some(ref path) => println!("  {} Using config {}", style("→").dim(), path.display()),
        None => println!(
            "  {} No config file found; using defaults (lookup: {})",
            style("→").dim(),
            config.lookup.endpoint
        ),
    }

    println!(
        "{} Initialized rsannotate in {}",
        style("✓").green(),
        settings.data_dir.display()
    );

    Ok(())
}
