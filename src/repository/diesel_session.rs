//! Diesel-based annotation session repository for SQLite.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::models::{NewSessionItem, NewSessionRecord, SessionRecord};
use super::pool::{AsyncSqliteConnection, AsyncSqlitePool, DieselError};
use super::util::{format_datetime, parse_datetime};
use super::{SessionPatch, SessionStore, StoreError};
use crate::models::{AnnotationSession, NewSession, SessionOverview, SessionStatus};
use crate::schema::{annotation_sessions, session_items};

impl SessionRecord {
    fn parsed_status(&self) -> Result<SessionStatus, DieselError> {
        SessionStatus::from_str(&self.status).ok_or_else(|| {
            DieselError::DeserializationError(
                format!("Invalid session status: '{}'", self.status).into(),
            )
        })
    }

    /// Convert a database record plus its processed identifiers to a domain model.
    fn into_session(
        self,
        processed_items: BTreeSet<String>,
    ) -> Result<AnnotationSession, DieselError> {
        let status = self.parsed_status()?;

        Ok(AnnotationSession {
            id: self.id,
            owner_id: self.owner_id,
            source_name: self.source_name,
            status,
            total_items: self.total_items.max(0) as u64,
            processed_items,
            processed_count: self.processed_count.max(0) as u64,
            source_digest: self.source_digest,
            created_at: parse_datetime(&self.created_at),
            updated_at: parse_datetime(&self.updated_at),
        })
    }

    fn into_overview(self) -> Result<SessionOverview, DieselError> {
        let status = self.parsed_status()?;

        Ok(SessionOverview {
            id: self.id,
            owner_id: self.owner_id,
            source_name: self.source_name,
            status,
            total_items: self.total_items.max(0) as u64,
            processed_count: self.processed_count.max(0) as u64,
            created_at: parse_datetime(&self.created_at),
            updated_at: parse_datetime(&self.updated_at),
        })
    }
}

/// Diesel-based session repository.
#[derive(Clone)]
pub struct DieselSessionRepository {
    pool: AsyncSqlitePool,
}

impl DieselSessionRepository {
    /// Create a new repository with an existing pool.
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    async fn load_items(
        conn: &mut AsyncSqliteConnection,
        session_id: &str,
    ) -> Result<BTreeSet<String>, DieselError> {
        let ids: Vec<String> = session_items::table
            .filter(session_items::session_id.eq(session_id))
            .select(session_items::identifier)
            .load(conn)
            .await?;
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl SessionStore for DieselSessionRepository {
    async fn create_session(&self, new: NewSession) -> Result<AnnotationSession, StoreError> {
        let session = new.into_session();
        let created_at = format_datetime(&session.created_at);

        let record = NewSessionRecord {
            id: &session.id,
            owner_id: &session.owner_id,
            source_name: &session.source_name,
            status: session.status.as_str(),
            total_items: session.total_items as i64,
            processed_count: 0,
            source_digest: &session.source_digest,
            created_at: &created_at,
            updated_at: &created_at,
        };

        let mut conn = self.pool.get().await?;
        diesel::insert_into(annotation_sessions::table)
            .values(&record)
            .execute(&mut conn)
            .await?;

        Ok(session)
    }

    /// Apply a patch in one transaction.
    ///
    /// Items are inserted with `INSERT OR IGNORE` and `processed_count` grows by
    /// the rows actually inserted, so re-sent identifiers are not counted twice.
    async fn update_session(&self, id: &str, patch: SessionPatch) -> Result<(), StoreError> {
        let session_id = id.to_string();
        let status = patch.status.map(|s| s.as_str());
        let items = patch.add_processed;
        let now = format_datetime(&Utc::now());

        let mut conn = self.pool.get().await?;
        let result = conn
            .transaction(|conn| {
                Box::pin(async move {
                    let target = annotation_sessions::table.find(session_id.as_str());
                    let rows = match status {
                        Some(status) => {
                            diesel::update(target)
                                .set((
                                    annotation_sessions::status.eq(status),
                                    annotation_sessions::updated_at.eq(&now),
                                ))
                                .execute(conn)
                                .await?
                        }
                        None => {
                            diesel::update(target)
                                .set(annotation_sessions::updated_at.eq(&now))
                                .execute(conn)
                                .await?
                        }
                    };
                    if rows == 0 {
                        return Err(DieselError::NotFound);
                    }

                    if items.is_empty() {
                        return Ok(());
                    }

                    let mut inserted: i64 = 0;
                    for identifier in &items {
                        inserted += diesel::insert_or_ignore_into(session_items::table)
                            .values(&NewSessionItem {
                                session_id: &session_id,
                                identifier,
                                processed_at: &now,
                            })
                            .execute(conn)
                            .await? as i64;
                    }

                    if inserted > 0 {
                        diesel::update(annotation_sessions::table.find(session_id.as_str()))
                            .set(
                                annotation_sessions::processed_count
                                    .eq(annotation_sessions::processed_count + inserted),
                            )
                            .execute(conn)
                            .await?;
                    }

                    Ok::<_, DieselError>(())
                })
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(DieselError::NotFound) => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_session(&self, id: &str) -> Result<Option<AnnotationSession>, StoreError> {
        let mut conn = self.pool.get().await?;

        let record = annotation_sessions::table
            .find(id)
            .first::<SessionRecord>(&mut conn)
            .await
            .optional()?;

        match record {
            Some(record) => {
                let items = Self::load_items(&mut conn, id).await?;
                Ok(Some(record.into_session(items)?))
            }
            None => Ok(None),
        }
    }

    async fn list_sessions(&self, owner_id: &str) -> Result<Vec<SessionOverview>, StoreError> {
        let mut conn = self.pool.get().await?;

        let records = annotation_sessions::table
            .filter(annotation_sessions::owner_id.eq(owner_id))
            .order((
                annotation_sessions::created_at.desc(),
                annotation_sessions::id.desc(),
            ))
            .load::<SessionRecord>(&mut conn)
            .await?;

        records
            .into_iter()
            .map(|record| record.into_overview().map_err(StoreError::from))
            .collect()
    }

    /// Single conditional `UPDATE`, so two processes racing for the same
    /// session cannot both see one affected row.
    async fn claim_run(
        &self,
        id: &str,
        run_id: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let now = format_datetime(&Utc::now());
        let stale = format_datetime(&stale_before);
        let mut conn = self.pool.get().await?;

        let rows = diesel::update(
            annotation_sessions::table
                .filter(annotation_sessions::id.eq(id))
                .filter(annotation_sessions::status.ne(SessionStatus::Completed.as_str()))
                .filter(
                    annotation_sessions::run_owner
                        .is_null()
                        .or(annotation_sessions::updated_at.lt(&stale)),
                ),
        )
        .set((
            annotation_sessions::run_owner.eq(Some(run_id)),
            annotation_sessions::status.eq(SessionStatus::InProgress.as_str()),
            annotation_sessions::updated_at.eq(&now),
        ))
        .execute(&mut conn)
        .await?;

        Ok(rows == 1)
    }

    async fn release_run(&self, id: &str, run_id: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        diesel::update(
            annotation_sessions::table
                .filter(annotation_sessions::id.eq(id))
                .filter(annotation_sessions::run_owner.eq(Some(run_id))),
        )
        .set(annotation_sessions::run_owner.eq(None::<&str>))
        .execute(&mut conn)
        .await?;
        Ok(())
    }
}
