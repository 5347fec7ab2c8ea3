//! Pipeline trigger-event handlers
//!
//! POST /events/transcript-ready and POST /events/job-completed. The fabric
//! delivers each event at least once; both handlers are safe to re-invoke
//! with the same payload. Status codes signal retryability: 5xx asks the
//! fabric to redeliver, 200 (including reported terminal failures) tells it
//! to stop.

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::models::{AnalysisJobSet, TranscriptReference};
use crate::pipeline::{
    classifier, dispatcher, dispatcher::DispatchOutcome, reconciler,
    reconciler::{JobCompletion, ReconcileOutcome}, transcript,
};
use crate::AppState;
use voxide_common::events::{AnalysisKind, AnalysisPath, JobOutcome, PipelineEvent};

/// POST /events/job-completed request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCompletionEvent {
    pub external_job_id: String,
    pub job_kind: AnalysisKind,
    pub outcome: JobOutcome,
    #[serde(default)]
    pub result_location: Option<String>,
}

/// External job identifiers of one dispatch, by kind
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobIds {
    pub sentiment: String,
    pub entities: String,
    pub key_phrases: String,
}

/// POST /events/transcript-ready response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptReadyResponse {
    pub analysis_id: String,
    pub analysis_type: AnalysisPath,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_ids: Option<JobIds>,
}

/// POST /events/job-completed response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCompletionResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_kinds: Option<Vec<AnalysisKind>>,
}

/// POST /events/transcript-ready
///
/// Classifies the transcript by extracted text size and runs the chosen
/// path: inline analysis completes (200) before responding, job dispatch
/// returns 202 with the job identifiers.
pub async fn transcript_ready(
    State(state): State<AppState>,
    Json(event): Json<TranscriptReference>,
) -> ApiResult<(StatusCode, Json<TranscriptReadyResponse>)> {
    if event.source_identifier.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "sourceIdentifier must not be empty".to_string(),
        ));
    }
    if event.transcript_location.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "transcriptLocation must not be empty".to_string(),
        ));
    }

    let text = transcript::load_transcript_text(state.store.as_ref(), &event.transcript_location)
        .await
        .map_err(crate::pipeline::PipelineError::from)?;

    let text_bytes = text.len() as u64;
    let threshold = state.config.pipeline.sync_threshold_bytes;
    let route = classifier::route_for_length(text_bytes, threshold);

    tracing::info!(
        source_identifier = %event.source_identifier,
        text_bytes,
        threshold,
        route = ?route,
        "Transcript classified"
    );

    state.event_bus.emit_lossy(PipelineEvent::AnalysisRouted {
        source_identifier: event.source_identifier.clone(),
        text_bytes,
        path: route,
        timestamp: Utc::now(),
    });

    match route {
        AnalysisPath::Synchronous => {
            let analysis_id =
                AnalysisJobSet::correlation_id_for(&event.source_identifier, Utc::now());

            let (analysis, output_location) = crate::pipeline::run_sync_analysis(
                state.analytics.as_ref(),
                state.store.as_ref(),
                &state.config.pipeline.analysis_prefix,
                &state.config.analytics.language_code,
                &event,
                &text,
                analysis_id,
            )
            .await?;

            state
                .event_bus
                .emit_lossy(PipelineEvent::SyncAnalysisCompleted {
                    analysis_id: analysis.analysis_id.clone(),
                    output_location: output_location.clone(),
                    timestamp: Utc::now(),
                });

            Ok((
                StatusCode::OK,
                Json(TranscriptReadyResponse {
                    analysis_id: analysis.analysis_id,
                    analysis_type: AnalysisPath::Synchronous,
                    status: "COMPLETED".to_string(),
                    output_location: Some(output_location),
                    job_ids: None,
                }),
            ))
        }
        AnalysisPath::Asynchronous => {
            let outcome = dispatcher::dispatch_jobs(
                &state.db,
                state.store.as_ref(),
                state.analytics.as_ref(),
                &state.config.pipeline,
                &state.config.analytics.language_code,
                &event,
                &text,
            )
            .await?;

            match outcome {
                DispatchOutcome::Dispatched(set) => {
                    state.event_bus.emit_lossy(PipelineEvent::JobsDispatched {
                        correlation_id: set.correlation_id.clone(),
                        sentiment_job_id: set.sentiment.external_job_id.clone(),
                        entities_job_id: set.entities.external_job_id.clone(),
                        key_phrases_job_id: set.key_phrases.external_job_id.clone(),
                        timestamp: Utc::now(),
                    });

                    Ok((
                        StatusCode::ACCEPTED,
                        Json(TranscriptReadyResponse {
                            analysis_id: set.correlation_id.clone(),
                            analysis_type: AnalysisPath::Asynchronous,
                            status: "IN_PROGRESS".to_string(),
                            output_location: None,
                            job_ids: Some(JobIds {
                                sentiment: set.sentiment.external_job_id,
                                entities: set.entities.external_job_id,
                                key_phrases: set.key_phrases.external_job_id,
                            }),
                        }),
                    ))
                }
                // Redelivered trigger while a set is in flight: answer 200
                // so the fabric stops; a 4xx/5xx would provoke more
                // redeliveries of an event that already took effect
                DispatchOutcome::AlreadyInFlight { correlation_id } => Ok((
                    StatusCode::OK,
                    Json(TranscriptReadyResponse {
                        analysis_id: correlation_id,
                        analysis_type: AnalysisPath::Asynchronous,
                        status: "ALREADY_IN_FLIGHT".to_string(),
                        output_location: None,
                        job_ids: None,
                    }),
                )),
            }
        }
    }
}

/// POST /events/job-completed
///
/// One invocation per finished detection job, in any order, possibly
/// redelivered. All reconciliation outcomes answer 200; only store or
/// database trouble earns a 5xx and thus a redelivery.
pub async fn job_completed(
    State(state): State<AppState>,
    Json(event): Json<JobCompletionEvent>,
) -> ApiResult<Json<JobCompletionResponse>> {
    if event.external_job_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "externalJobId must not be empty".to_string(),
        ));
    }
    if event.outcome == JobOutcome::Succeeded && event.result_location.is_none() {
        return Err(ApiError::BadRequest(
            "resultLocation is required when outcome is SUCCEEDED".to_string(),
        ));
    }

    let completion = JobCompletion {
        external_job_id: event.external_job_id.clone(),
        kind: event.job_kind,
        outcome: event.outcome,
        result_location: event.result_location.clone(),
    };

    let outcome = reconciler::handle_completion(
        &state.db,
        state.store.as_ref(),
        &state.config.pipeline.analysis_prefix,
        &state.config.analytics.language_code,
        &completion,
    )
    .await?;

    let response = match outcome {
        ReconcileOutcome::NoMatchingSet => {
            state.event_bus.emit_lossy(PipelineEvent::MatchingFailure {
                external_job_id: event.external_job_id,
                kind: event.job_kind,
                timestamp: Utc::now(),
            });
            JobCompletionResponse {
                status: "NO_MATCHING_SET".to_string(),
                correlation_id: None,
                output_location: None,
                failed_kinds: None,
            }
        }
        ReconcileOutcome::AlreadyRetired { correlation_id } => JobCompletionResponse {
            status: "ALREADY_RETIRED".to_string(),
            correlation_id: Some(correlation_id),
            output_location: None,
            failed_kinds: None,
        },
        ReconcileOutcome::Duplicate { correlation_id } => JobCompletionResponse {
            status: "DUPLICATE".to_string(),
            correlation_id: Some(correlation_id),
            output_location: None,
            failed_kinds: None,
        },
        ReconcileOutcome::Recorded { correlation_id } => {
            state
                .event_bus
                .emit_lossy(PipelineEvent::JobCompletionRecorded {
                    correlation_id: correlation_id.clone(),
                    kind: event.job_kind,
                    outcome: event.outcome,
                    timestamp: Utc::now(),
                });
            JobCompletionResponse {
                status: "RECORDED".to_string(),
                correlation_id: Some(correlation_id),
                output_location: None,
                failed_kinds: None,
            }
        }
        ReconcileOutcome::Aggregated {
            correlation_id,
            output_location,
        } => {
            state
                .event_bus
                .emit_lossy(PipelineEvent::JobCompletionRecorded {
                    correlation_id: correlation_id.clone(),
                    kind: event.job_kind,
                    outcome: event.outcome,
                    timestamp: Utc::now(),
                });
            state
                .event_bus
                .emit_lossy(PipelineEvent::AnalysisAggregated {
                    correlation_id: correlation_id.clone(),
                    output_location: output_location.clone(),
                    timestamp: Utc::now(),
                });
            JobCompletionResponse {
                status: "AGGREGATED".to_string(),
                correlation_id: Some(correlation_id),
                output_location: Some(output_location),
                failed_kinds: None,
            }
        }
        ReconcileOutcome::SetFailed {
            correlation_id,
            failed_kinds,
        } => {
            state
                .event_bus
                .emit_lossy(PipelineEvent::JobCompletionRecorded {
                    correlation_id: correlation_id.clone(),
                    kind: event.job_kind,
                    outcome: event.outcome,
                    timestamp: Utc::now(),
                });
            state.event_bus.emit_lossy(PipelineEvent::AnalysisFailed {
                correlation_id: correlation_id.clone(),
                failed_kinds: failed_kinds.clone(),
                timestamp: Utc::now(),
            });
            JobCompletionResponse {
                status: "FAILED".to_string(),
                correlation_id: Some(correlation_id),
                output_location: None,
                failed_kinds: Some(failed_kinds),
            }
        }
    };

    Ok(Json(response))
}

/// Build event webhook routes
pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/events/transcript-ready", post(transcript_ready))
        .route("/events/job-completed", post(job_completed))
}
