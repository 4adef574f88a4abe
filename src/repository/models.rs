//! Diesel ORM models for database tables.

use diesel::prelude::*;

use crate::schema;

/// Annotation session record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::annotation_sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SessionRecord {
    pub id: String,
    pub owner_id: String,
    pub source_name: String,
    pub status: String,
    pub total_items: i64,
    pub processed_count: i64,
    pub source_digest: String,
    pub created_at: String,
    pub updated_at: String,
    /// Token of the run currently holding the session, if any.
    pub run_owner: Option<String>,
}

/// New session for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::annotation_sessions)]
pub struct NewSessionRecord<'a> {
    pub id: &'a str,
    pub owner_id: &'a str,
    pub source_name: &'a str,
    pub status: &'a str,
    pub total_items: i64,
    pub processed_count: i64,
    pub source_digest: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Processed identifier for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::session_items)]
pub struct NewSessionItem<'a> {
    pub session_id: &'a str,
    pub identifier: &'a str,
    pub processed_at: &'a str,
}

/// Annotation result record from the database.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = schema::annotation_results)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ResultRecord {
    pub session_id: String,
    pub identifier: String,
    pub consequence: Option<String>,
    pub gene: Option<String>,
    pub transcript_id: Option<String>,
    pub payload: String,
    pub updated_at: String,
}

/// New annotation result for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::annotation_results)]
pub struct NewResultRecord<'a> {
    pub session_id: &'a str,
    pub identifier: &'a str,
    pub consequence: Option<&'a str>,
    pub gene: Option<&'a str>,
    pub transcript_id: Option<&'a str>,
    pub payload: &'a str,
    pub updated_at: &'a str,
}
