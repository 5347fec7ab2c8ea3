//! voxide-ta library interface
//!
//! Exposes the pipeline coordinator and its HTTP surface for integration
//! testing.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use voxide_common::config::TomlConfig;
use voxide_common::events::EventBus;

use crate::services::{ObjectStore, TextAnalytics};

/// Application state shared across handlers
///
/// Handlers themselves are stateless; everything here is either immutable
/// configuration or a handle to the durable stores the handlers coordinate
/// through.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool holding the dispatch records
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Artifact store shared with the transcription stage and the engine
    pub store: Arc<dyn ObjectStore>,
    /// Text-analytics engine client
    pub analytics: Arc<dyn TextAnalytics>,
    /// Resolved configuration, immutable per run
    pub config: Arc<TomlConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        store: Arc<dyn ObjectStore>,
        analytics: Arc<dyn TextAnalytics>,
        config: Arc<TomlConfig>,
    ) -> Self {
        Self {
            db,
            event_bus,
            store,
            analytics,
            config,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::event_routes())
        .merge(api::analysis_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Report in-flight dispatch records older than the cutoff.
///
/// Sets this old will normally never complete (their completion events are
/// long gone, or the dispatcher died between submissions). They are left in
/// place in case a straggler completion still arrives; the report is the
/// operator's signal to investigate.
pub async fn report_stale_job_sets(
    pool: &SqlitePool,
    cutoff: DateTime<Utc>,
) -> voxide_common::Result<usize> {
    let stale = db::job_sets::list_stale_in_flight(pool, cutoff).await?;

    for (correlation_id, dispatched_at) in &stale {
        tracing::warn!(
            correlation_id = %correlation_id,
            dispatched_at = %dispatched_at,
            "Stale in-flight job set from a previous run"
        );
    }

    if !stale.is_empty() {
        tracing::warn!(
            count = stale.len(),
            "Found stale in-flight job sets; see preceding entries"
        );
    }

    Ok(stale.len())
}
