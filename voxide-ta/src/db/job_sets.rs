//! Dispatch-record persistence
//!
//! The `analysis_job_sets` row is the only cross-invocation shared state in
//! the coordinator. Every mutation is a conditional update on the row's
//! `version` column; a return of `false` means another handler instance got
//! there first and the caller must re-read and retry.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use voxide_common::events::AnalysisKind;
use voxide_common::{Error, Result};

use crate::models::{AnalysisJobSet, JobSetState, JobSlot, SlotStatus};

/// Column names for one slot. Static strings only; these are interpolated
/// into SQL text.
fn slot_columns(kind: AnalysisKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        AnalysisKind::Sentiment => (
            "sentiment_job_id",
            "sentiment_status",
            "sentiment_result_location",
        ),
        AnalysisKind::Entities => (
            "entities_job_id",
            "entities_status",
            "entities_result_location",
        ),
        AnalysisKind::KeyPhrases => (
            "key_phrases_job_id",
            "key_phrases_status",
            "key_phrases_result_location",
        ),
    }
}

const SELECT_COLUMNS: &str = "correlation_id, source_identifier, transcript_location, state, \
     version, text_length, text_bytes, \
     sentiment_job_id, sentiment_status, sentiment_result_location, \
     entities_job_id, entities_status, entities_result_location, \
     key_phrases_job_id, key_phrases_status, key_phrases_result_location, \
     dispatched_at, retired_at";

/// Insert a freshly dispatched record. Fails if the correlation identifier
/// already exists; dispatch records are created exactly once.
pub async fn insert_job_set(pool: &SqlitePool, set: &AnalysisJobSet) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO analysis_job_sets (
            correlation_id, source_identifier, transcript_location, state,
            version, text_length, text_bytes,
            sentiment_job_id, sentiment_status, sentiment_result_location,
            entities_job_id, entities_status, entities_result_location,
            key_phrases_job_id, key_phrases_status, key_phrases_result_location,
            dispatched_at, retired_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&set.correlation_id)
    .bind(&set.source_identifier)
    .bind(&set.transcript_location)
    .bind(set.state.as_str())
    .bind(set.version)
    .bind(set.text_length as i64)
    .bind(set.text_bytes as i64)
    .bind(&set.sentiment.external_job_id)
    .bind(set.sentiment.status.as_str())
    .bind(&set.sentiment.result_location)
    .bind(&set.entities.external_job_id)
    .bind(set.entities.status.as_str())
    .bind(&set.entities.result_location)
    .bind(&set.key_phrases.external_job_id)
    .bind(set.key_phrases.status.as_str())
    .bind(&set.key_phrases.result_location)
    .bind(set.dispatched_at.to_rfc3339())
    .bind(set.retired_at.map(|dt| dt.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a record by correlation identifier.
pub async fn load_job_set(
    pool: &SqlitePool,
    correlation_id: &str,
) -> Result<Option<AnalysisJobSet>> {
    let sql = format!(
        "SELECT {} FROM analysis_job_sets WHERE correlation_id = ?",
        SELECT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(correlation_id)
        .fetch_optional(pool)
        .await?;

    row.map(|row| row_to_job_set(&row)).transpose()
}

/// Reverse lookup: find the record owning the given external job identifier.
///
/// A completion event names only its own job; this is how it finds the set.
pub async fn find_by_external_job_id(
    pool: &SqlitePool,
    external_job_id: &str,
) -> Result<Option<AnalysisJobSet>> {
    let sql = format!(
        "SELECT {} FROM analysis_job_sets \
         WHERE sentiment_job_id = ?1 OR entities_job_id = ?1 OR key_phrases_job_id = ?1",
        SELECT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(external_job_id)
        .fetch_optional(pool)
        .await?;

    row.map(|row| row_to_job_set(&row)).transpose()
}

/// Find the in-flight record for a source identifier, if one exists.
///
/// Used by the dispatcher to detect duplicate dispatch attempts under
/// at-least-once delivery of the transcript-ready event.
pub async fn find_in_flight_by_source(
    pool: &SqlitePool,
    source_identifier: &str,
) -> Result<Option<AnalysisJobSet>> {
    let sql = format!(
        "SELECT {} FROM analysis_job_sets \
         WHERE source_identifier = ? AND state = 'IN_FLIGHT' \
         ORDER BY dispatched_at DESC LIMIT 1",
        SELECT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(source_identifier)
        .fetch_optional(pool)
        .await?;

    row.map(|row| row_to_job_set(&row)).transpose()
}

/// Transition one slot out of PENDING, conditioned on the record version.
///
/// Returns `true` if this invocation performed the transition. `false`
/// means the version moved underneath us (concurrent sibling event) or the
/// slot already left PENDING; the caller re-reads and decides.
pub async fn transition_slot(
    pool: &SqlitePool,
    correlation_id: &str,
    kind: AnalysisKind,
    status: SlotStatus,
    result_location: Option<&str>,
    expected_version: i64,
) -> Result<bool> {
    let (_, status_col, location_col) = slot_columns(kind);
    let sql = format!(
        "UPDATE analysis_job_sets \
         SET {status} = ?, {location} = COALESCE(?, {location}), version = version + 1 \
         WHERE correlation_id = ? AND version = ? AND {status} = 'PENDING' AND state = 'IN_FLIGHT'",
        status = status_col,
        location = location_col,
    );

    let result = sqlx::query(&sql)
        .bind(status.as_str())
        .bind(result_location)
        .bind(correlation_id)
        .bind(expected_version)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Retire a record into a terminal state, conditioned on the version.
pub async fn retire_job_set(
    pool: &SqlitePool,
    correlation_id: &str,
    state: JobSetState,
    expected_version: i64,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE analysis_job_sets \
         SET state = ?, retired_at = ?, version = version + 1 \
         WHERE correlation_id = ? AND version = ? AND state = 'IN_FLIGHT'",
    )
    .bind(state.as_str())
    .bind(Utc::now().to_rfc3339())
    .bind(correlation_id)
    .bind(expected_version)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// In-flight records dispatched before the cutoff, oldest first.
pub async fn list_stale_in_flight(
    pool: &SqlitePool,
    cutoff: DateTime<Utc>,
) -> Result<Vec<(String, DateTime<Utc>)>> {
    let rows = sqlx::query(
        "SELECT correlation_id, dispatched_at FROM analysis_job_sets \
         WHERE state = 'IN_FLIGHT' AND dispatched_at < ? \
         ORDER BY dispatched_at ASC",
    )
    .bind(cutoff.to_rfc3339())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let correlation_id: String = row.get("correlation_id");
            let dispatched_at = parse_timestamp(row.get("dispatched_at"))?;
            Ok((correlation_id, dispatched_at))
        })
        .collect()
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}

fn row_to_slot(row: &sqlx::sqlite::SqliteRow, kind: AnalysisKind) -> Result<JobSlot> {
    let (job_id_col, status_col, location_col) = slot_columns(kind);
    let status: String = row.get(status_col);
    Ok(JobSlot {
        external_job_id: row.get(job_id_col),
        status: SlotStatus::from_db(&status)?,
        result_location: row.get(location_col),
    })
}

fn row_to_job_set(row: &sqlx::sqlite::SqliteRow) -> Result<AnalysisJobSet> {
    let state: String = row.get("state");
    let retired_at: Option<String> = row.get("retired_at");

    Ok(AnalysisJobSet {
        correlation_id: row.get("correlation_id"),
        source_identifier: row.get("source_identifier"),
        transcript_location: row.get("transcript_location"),
        state: JobSetState::from_db(&state)?,
        version: row.get("version"),
        text_length: row.get::<i64, _>("text_length") as usize,
        text_bytes: row.get::<i64, _>("text_bytes") as u64,
        sentiment: row_to_slot(row, AnalysisKind::Sentiment)?,
        entities: row_to_slot(row, AnalysisKind::Entities)?,
        key_phrases: row_to_slot(row, AnalysisKind::KeyPhrases)?,
        dispatched_at: parse_timestamp(row.get("dispatched_at"))?,
        retired_at: retired_at.map(parse_timestamp).transpose()?,
    })
}
