//! Configuration management for rsannotate using the prefer crate.

mod loader;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::extract::{IdentifierExtractor, DEFAULT_COMMENT_MARKER, DEFAULT_IDENTIFIER_PATTERN};
use crate::lookup::LookupConfig;
use crate::runner::{ResumePolicy, RunnerOptions, DEFAULT_BATCH_SIZE, DEFAULT_STALE_RUN_SECS};

pub use loader::{load_settings_with_options, LoadOptions};
pub use settings::Settings;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "rsannotate.db";

/// Owner used when neither config nor environment names one.
pub const DEFAULT_OWNER: &str = "local";

/// Annotation run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationConfig {
    /// Identifiers per lookup call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pattern a token must fully match to count as an identifier.
    #[serde(default = "default_identifier_pattern")]
    pub identifier_pattern: String,
    /// Lines starting with this marker are skipped.
    #[serde(default = "default_comment_marker")]
    pub comment_marker: String,
    /// Behavior when a resume gets a different identifier list.
    #[serde(default)]
    pub resume_policy: ResumePolicy,
    /// Seconds without a write after which another run's claim is ignored.
    #[serde(default = "default_stale_run_secs")]
    pub stale_run_secs: u64,
}

fn default_stale_run_secs() -> u64 {
    DEFAULT_STALE_RUN_SECS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_identifier_pattern() -> String {
    DEFAULT_IDENTIFIER_PATTERN.to_string()
}

fn default_comment_marker() -> String {
    DEFAULT_COMMENT_MARKER.to_string()
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            identifier_pattern: default_identifier_pattern(),
            comment_marker: default_comment_marker(),
            resume_policy: ResumePolicy::default(),
            stale_run_secs: default_stale_run_secs(),
        }
    }
}

impl AnnotationConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Build the identifier extractor. Fails on an invalid pattern.
    pub fn extractor(&self) -> Result<IdentifierExtractor, regex::Error> {
        IdentifierExtractor::new(&self.identifier_pattern, &self.comment_marker)
    }

    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            batch_size: self.batch_size,
            resume_policy: self.resume_policy,
            stale_run_after: Duration::from_secs(self.stale_run_secs),
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "target")]
    pub data_dir: Option<String>,
    /// Database filename or URL.
    /// A plain filename (e.g. "rsannotate.db") is joined with data_dir;
    /// a `sqlite:` URL is used as is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Owner recorded on new sessions and used to list them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "AnnotationConfig::is_default")]
    pub annotation: AnnotationConfig,
    #[serde(default, skip_serializing_if = "LookupConfig::is_default")]
    pub lookup: LookupConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers rsannotate config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("rsannotate").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("Ignoring config {}: {}", path.display(), e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            // No config file found
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths (typically config file dir or CWD).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            if database.starts_with("sqlite:") || database.contains("://") {
                settings.database_url = Some(database.clone());
            } else {
                settings.database_filename = database.clone();
            }
        }
        if let Some(ref owner) = self.owner {
            settings.owner = owner.clone();
        }
    }
}
