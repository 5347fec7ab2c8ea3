//! Dispatch-record inspection API

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::models::{JobSetState, JobSlot};
use crate::AppState;

/// GET /analyses/{correlation_id} response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSetStatusResponse {
    pub correlation_id: String,
    pub source_identifier: String,
    pub transcript_location: String,
    pub state: JobSetState,
    pub sentiment: JobSlot,
    pub entities: JobSlot,
    pub key_phrases: JobSlot,
    pub dispatched_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retired_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// GET /analyses/{correlation_id}
///
/// Current state of one dispatch record, for operator inspection.
pub async fn get_job_set(
    State(state): State<AppState>,
    Path(correlation_id): Path<String>,
) -> ApiResult<Json<JobSetStatusResponse>> {
    let set = crate::db::job_sets::load_job_set(&state.db, &correlation_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No job set for {}", correlation_id)))?;

    Ok(Json(JobSetStatusResponse {
        correlation_id: set.correlation_id,
        source_identifier: set.source_identifier,
        transcript_location: set.transcript_location,
        state: set.state,
        sentiment: set.sentiment,
        entities: set.entities,
        key_phrases: set.key_phrases,
        dispatched_at: set.dispatched_at,
        retired_at: set.retired_at,
    }))
}

/// Build analysis inspection routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new().route("/analyses/:correlation_id", get(get_job_set))
}
