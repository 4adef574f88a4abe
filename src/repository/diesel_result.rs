//! Diesel-based annotation result repository for SQLite.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::models::{NewResultRecord, ResultRecord};
use super::pool::{AsyncSqlitePool, DieselError};
use super::util::format_datetime;
use super::{ResultStore, StoreError};
use crate::models::AnnotationResult;
use crate::schema::annotation_results;

impl TryFrom<ResultRecord> for AnnotationResult {
    type Error = StoreError;

    fn try_from(record: ResultRecord) -> Result<Self, Self::Error> {
        let payload = serde_json::from_str(&record.payload).map_err(|e| {
            StoreError::Corrupt(format!(
                "payload for {}/{}: {}",
                record.session_id, record.identifier, e
            ))
        })?;

        Ok(AnnotationResult {
            identifier: record.identifier,
            consequence: record.consequence,
            gene: record.gene,
            transcript_id: record.transcript_id,
            payload,
        })
    }
}

/// Diesel-based result repository.
#[derive(Clone)]
pub struct DieselResultRepository {
    pool: AsyncSqlitePool,
}

impl DieselResultRepository {
    /// Create a new repository with an existing pool.
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Count stored results for a session.
    pub async fn count(&self, session_id: &str) -> Result<u64, StoreError> {
        let mut conn = self.pool.get().await?;
        let count: i64 = annotation_results::table
            .filter(annotation_results::session_id.eq(session_id))
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl ResultStore for DieselResultRepository {
    /// Upsert all results for a batch in one transaction.
    async fn upsert_results(
        &self,
        session_id: &str,
        results: &[AnnotationResult],
    ) -> Result<(), StoreError> {
        if results.is_empty() {
            return Ok(());
        }

        let payloads = results
            .iter()
            .map(|r| serde_json::to_string(&r.payload))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Other(format!("Failed to encode payload: {}", e)))?;
        let now = format_datetime(&Utc::now());
        let session = session_id.to_string();
        let results = results.to_vec();

        let mut conn = self.pool.get().await?;
        let outcome = conn
            .transaction(|conn| {
                Box::pin(async move {
                    for (result, payload) in results.iter().zip(&payloads) {
                        let record = NewResultRecord {
                            session_id: &session,
                            identifier: &result.identifier,
                            consequence: result.consequence.as_deref(),
                            gene: result.gene.as_deref(),
                            transcript_id: result.transcript_id.as_deref(),
                            payload,
                            updated_at: &now,
                        };

                        diesel::insert_into(annotation_results::table)
                            .values(&record)
                            .on_conflict((
                                annotation_results::session_id,
                                annotation_results::identifier,
                            ))
                            .do_update()
                            .set((
                                annotation_results::consequence.eq(record.consequence),
                                annotation_results::gene.eq(record.gene),
                                annotation_results::transcript_id.eq(record.transcript_id),
                                annotation_results::payload.eq(record.payload),
                                annotation_results::updated_at.eq(record.updated_at),
                            ))
                            .execute(conn)
                            .await?;
                    }
                    Ok::<_, DieselError>(())
                })
            })
            .await;

        match outcome {
            Ok(()) => Ok(()),
            Err(DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)) => {
                Err(StoreError::NotFound(session_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_results(&self, session_id: &str) -> Result<Vec<AnnotationResult>, StoreError> {
        let mut conn = self.pool.get().await?;

        let records = annotation_results::table
            .filter(annotation_results::session_id.eq(session_id))
            .order(annotation_results::identifier.asc())
            .select(ResultRecord::as_select())
            .load(&mut conn)
            .await?;

        records.into_iter().map(AnnotationResult::try_from).collect()
    }
}
