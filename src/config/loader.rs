//! Settings loading: config discovery, `--target` resolution and environment overrides.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{Config, Settings, DEFAULT_DATABASE_FILENAME};
use crate::repository::util::validate_database_url;

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
    /// Data directory or database file (--target flag).
    /// Can be a directory containing rsannotate.db or a .db file directly.
    pub data: Option<PathBuf>,
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    }
}

fn is_db_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "db" || ext == "sqlite" || ext == "sqlite3")
        || (path.exists() && path.is_file())
}

/// Split a `--target` path into (data dir, database filename).
fn resolve_target(path: &Path) -> (PathBuf, String) {
    let path = absolute(path);
    if is_db_file(&path) {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_DATABASE_FILENAME)
            .to_string();
        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        (dir, filename)
    } else {
        (path, DEFAULT_DATABASE_FILENAME.to_string())
    }
}

/// Look for a config file next to the database.
/// Checks for rsannotate.{ext} and config.{ext}.
fn find_config_next_to_db(data_dir: &Path) -> Option<PathBuf> {
    let extensions = ["json", "toml", "yaml", "yml"];
    let basenames = ["rsannotate", "config"];

    for basename in basenames {
        for ext in extensions {
            let path = data_dir.join(format!("{}.{}", basename, ext));
            if path.exists() {
                return Some(path);
            }
        }
    }
    None
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

async fn load_file_config(
    options: &LoadOptions,
    data_dir_override: Option<&PathBuf>,
) -> anyhow::Result<Config> {
    // Priority 1: Explicit --config flag
    if let Some(ref config_path) = options.config_path {
        return Config::load_from_path(config_path)
            .await
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Loading {}", config_path.display()));
    }

    // Priority 2: Config next to data dir
    if let Some(data_dir) = data_dir_override {
        if let Some(config_path) = find_config_next_to_db(data_dir) {
            tracing::debug!("Found config next to data dir: {}", config_path.display());
            return Config::load_from_path(&config_path)
                .await
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Loading {}", config_path.display()));
        }
    }

    // Priority 3: Auto-discover via prefer
    Ok(Config::load().await)
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> anyhow::Result<(Settings, Config)> {
    let database_url = env_var("DATABASE_URL");
    if let Some(ref url) = database_url {
        validate_database_url(url).map_err(anyhow::Error::msg)?;
    }

    let target = options.data.as_deref().map(resolve_target);
    let data_dir_override = target.as_ref().map(|(dir, _)| dir.clone());

    let mut config = load_file_config(&options, data_dir_override.as_ref()).await?;

    let mut settings = Settings::default();

    // Determine base directory for resolving relative paths
    let base_dir = if options.use_cwd {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    } else {
        config
            .base_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    };

    config.apply_to_settings(&mut settings, &base_dir);

    // --target takes precedence over the config file
    if let Some((data_dir, filename)) = target {
        settings.data_dir = data_dir;
        settings.database_filename = filename;
        settings.database_url = None;
    }

    // DATABASE_URL environment variable takes highest precedence
    if let Some(url) = database_url {
        tracing::debug!("Using DATABASE_URL from environment: {}", url);
        settings.database_url = Some(url);
    }

    if let Some(owner) = env_var("RSANNO_OWNER") {
        tracing::debug!("Using RSANNO_OWNER from environment: {}", owner);
        settings.owner = owner;
    }

    if let Some(endpoint) = env_var("RSANNO_LOOKUP_ENDPOINT") {
        config.lookup.endpoint = endpoint;
    }

    Ok((settings, config))
}
