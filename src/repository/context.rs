//! Database context for managing connections and repository access.
//!
//! The DbContext is the primary entry point for all database operations.
//! It holds the connection factory and hands out repositories.

use std::path::Path;
use std::sync::Arc;

use super::diesel_result::DieselResultRepository;
use super::diesel_session::DieselSessionRepository;
use super::pool::{AsyncSqlitePool, DieselError};
use super::util::validate_database_url;
use super::{ResultStore, SessionStore};

/// Database context that owns the pool and provides repository access.
///
/// # Example
/// ```ignore
/// let ctx = DbContext::from_url("sqlite:/tmp/rsannotate.db")?;
/// ctx.migrate().await?;
/// let sessions = ctx.sessions().list_sessions("local").await?;
/// ```
#[derive(Clone)]
pub struct DbContext {
    pool: AsyncSqlitePool,
}

impl DbContext {
    /// Create a context from a database file path.
    pub fn new(db_path: &Path) -> Self {
        Self {
            pool: AsyncSqlitePool::from_path(db_path),
        }
    }

    /// Create a context from a database URL. Only SQLite is supported.
    pub fn from_url(url: &str) -> Result<Self, String> {
        validate_database_url(url)?;
        Ok(Self {
            pool: AsyncSqlitePool::new(url),
        })
    }

    /// Get the underlying connection factory.
    pub fn pool(&self) -> &AsyncSqlitePool {
        &self.pool
    }

    /// Apply pending migrations, returning the names applied.
    pub async fn migrate(&self) -> Result<Vec<String>, DieselError> {
        super::migrations::run_migrations(self.pool.database_url()).await
    }

    pub fn sessions(&self) -> DieselSessionRepository {
        DieselSessionRepository::new(self.pool.clone())
    }

    pub fn results(&self) -> DieselResultRepository {
        DieselResultRepository::new(self.pool.clone())
    }

    /// Trait-object handles for the annotation runner.
    pub fn stores(&self) -> (Arc<dyn SessionStore>, Arc<dyn ResultStore>) {
        (Arc::new(self.sessions()), Arc::new(self.results()))
    }
}
