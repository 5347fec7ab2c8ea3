//! Database initialization
//!
//! Opens (or creates) the SQLite database, applies connection pragmas, and
//! creates the coordinator tables. Safe to call on every startup; all
//! statements are idempotent.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers while one event handler writes; the
    // coordinator is invoked once per fabric event, so overlapping handler
    // instances are the normal case.
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_analysis_job_sets_table(&pool).await?;

    Ok(pool)
}

/// Create the dispatch-record table and its lookup indexes.
///
/// One row per in-flight (or retired) asynchronous dispatch. The `version`
/// column carries the optimistic-concurrency counter every slot transition
/// is conditioned on; the per-kind `*_job_id` indexes serve the reverse
/// lookup from a completion event to its owning record.
pub async fn create_analysis_job_sets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_job_sets (
            correlation_id TEXT PRIMARY KEY,
            source_identifier TEXT NOT NULL,
            transcript_location TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'IN_FLIGHT',
            version INTEGER NOT NULL DEFAULT 0,
            text_length INTEGER NOT NULL DEFAULT 0,
            text_bytes INTEGER NOT NULL DEFAULT 0,
            sentiment_job_id TEXT NOT NULL,
            sentiment_status TEXT NOT NULL DEFAULT 'PENDING',
            sentiment_result_location TEXT,
            entities_job_id TEXT NOT NULL,
            entities_status TEXT NOT NULL DEFAULT 'PENDING',
            entities_result_location TEXT,
            key_phrases_job_id TEXT NOT NULL,
            key_phrases_status TEXT NOT NULL DEFAULT 'PENDING',
            key_phrases_result_location TEXT,
            dispatched_at TEXT NOT NULL,
            retired_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_job_sets_sentiment_job \
         ON analysis_job_sets(sentiment_job_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_job_sets_entities_job \
         ON analysis_job_sets(entities_job_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_job_sets_key_phrases_job \
         ON analysis_job_sets(key_phrases_job_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_job_sets_source_state \
         ON analysis_job_sets(source_identifier, state)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
