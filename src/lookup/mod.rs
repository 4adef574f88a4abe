//! External annotation lookup.
//!
//! The runner only sees the `LookupService` trait; the Ensembl VEP client is
//! the production implementation.

mod config;
mod ensembl;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::AnnotationResult;

pub use config::LookupConfig;
pub use ensembl::EnsemblVepClient;

/// Errors from a lookup call. Any of these fails the whole batch.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Lookup service not available: {0}")]
    Unavailable(String),
}

/// A service that annotates a batch of identifiers.
///
/// Implementations may return fewer results than identifiers (unknown ids
/// have no annotation) and give no ordering guarantee.
#[async_trait]
pub trait LookupService: Send + Sync {
    /// Human-readable name for progress output.
    fn name(&self) -> &str;

    /// Annotate one batch of identifiers.
    async fn lookup(&self, identifiers: &[String]) -> Result<Vec<AnnotationResult>, LookupError>;
}
