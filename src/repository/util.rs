//! Repository utilities.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::result::DatabaseErrorInformation;

/// Simple error info wrapper for database errors.
#[derive(Debug)]
pub struct DbErrorInfo(pub String);

impl DatabaseErrorInformation for DbErrorInfo {
    fn message(&self) -> &str {
        &self.0
    }
    fn details(&self) -> Option<&str> {
        None
    }
    fn hint(&self) -> Option<&str> {
        None
    }
    fn table_name(&self) -> Option<&str> {
        None
    }
    fn column_name(&self) -> Option<&str> {
        None
    }
    fn constraint_name(&self) -> Option<&str> {
        None
    }
    fn statement_position(&self) -> Option<i32> {
        None
    }
}

/// Convert any displayable error to a diesel error with proper message.
pub fn to_diesel_error(e: impl std::fmt::Display) -> diesel::result::Error {
    diesel::result::Error::DatabaseError(
        diesel::result::DatabaseErrorKind::Unknown,
        Box::new(DbErrorInfo(e.to_string())),
    )
}

/// Check whether a database URL points at SQLite.
///
/// Plain file paths count as SQLite.
pub fn is_sqlite_url(url: &str) -> bool {
    url.starts_with("sqlite:") || !url.contains("://")
}

/// Reject database URLs for backends this build cannot talk to.
pub fn validate_database_url(url: &str) -> Result<(), String> {
    if is_sqlite_url(url) {
        Ok(())
    } else {
        let scheme = url.split("://").next().unwrap_or(url);
        Err(format!(
            "Unsupported database URL scheme '{}': only SQLite databases are supported",
            scheme
        ))
    }
}

/// Timestamp format used for stored datetimes.
///
/// Fixed-width microseconds keep lexical order equal to time order.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
