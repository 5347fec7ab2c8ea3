//! Asynchronous job dispatch
//!
//! Stages the transcript text for the analytics engine, submits one
//! detection job per analysis kind under a shared correlation identifier,
//! and persists the dispatch record the reconciler will track completions
//! against.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::job_sets;
use crate::models::{AnalysisJobSet, TranscriptReference};
use crate::pipeline::PipelineError;
use crate::services::{DetectionJobRequest, ObjectStore, TextAnalytics};
use crate::utils::db_retry::retry_on_lock;
use voxide_common::config::PipelineConfig;
use voxide_common::events::AnalysisKind;

/// Result of a dispatch attempt
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Three jobs submitted, record persisted
    Dispatched(AnalysisJobSet),
    /// A record for this source is still in flight; nothing was submitted.
    /// Happens under at-least-once delivery of the transcript-ready event.
    AlreadyInFlight { correlation_id: String },
}

pub async fn dispatch_jobs(
    pool: &SqlitePool,
    store: &dyn ObjectStore,
    analytics: &dyn TextAnalytics,
    config: &PipelineConfig,
    language_code: &str,
    transcript: &TranscriptReference,
    text: &str,
) -> Result<DispatchOutcome, PipelineError> {
    if let Some(existing) =
        job_sets::find_in_flight_by_source(pool, &transcript.source_identifier).await?
    {
        tracing::warn!(
            source_identifier = %transcript.source_identifier,
            correlation_id = %existing.correlation_id,
            "Dispatch requested while a job set is already in flight; skipping"
        );
        return Ok(DispatchOutcome::AlreadyInFlight {
            correlation_id: existing.correlation_id,
        });
    }

    let dispatched_at = Utc::now();
    let correlation_id =
        AnalysisJobSet::correlation_id_for(&transcript.source_identifier, dispatched_at);

    // Stage the extracted text where the engine's job workers can read it
    let input_location = format!("{}{}.txt", config.job_input_prefix, correlation_id);
    store.put(&input_location, text.as_bytes()).await?;
    tracing::info!(
        correlation_id = %correlation_id,
        input_location = %input_location,
        "Staged job input text"
    );

    let mut job_ids: Vec<(AnalysisKind, String)> = Vec::with_capacity(3);
    for kind in AnalysisKind::ALL {
        let request = DetectionJobRequest {
            job_name: format!("{}-{}", kind.as_str(), correlation_id),
            kind,
            input_location: input_location.clone(),
            output_location: format!(
                "{}{}/{}/",
                config.job_output_prefix,
                correlation_id,
                kind.as_str()
            ),
            language_code: language_code.to_string(),
        };

        match analytics.start_detection_job(request).await {
            Ok(job_id) => job_ids.push((kind, job_id)),
            Err(e) => {
                // Jobs submitted before the failure keep running on the
                // engine; with no record persisted, their completions will
                // surface as matching failures.
                tracing::error!(
                    correlation_id = %correlation_id,
                    kind = %kind,
                    submitted = ?job_ids,
                    error = %e,
                    "Job submission failed; no dispatch record persisted, \
                     earlier submissions are orphaned"
                );
                return Err(e.into());
            }
        }
    }

    let job_id_for = |kind: AnalysisKind| -> String {
        job_ids
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
            .unwrap_or_default()
    };

    let set = AnalysisJobSet::new(
        transcript.source_identifier.clone(),
        transcript.transcript_location.clone(),
        text.chars().count(),
        text.len() as u64,
        job_id_for(AnalysisKind::Sentiment),
        job_id_for(AnalysisKind::Entities),
        job_id_for(AnalysisKind::KeyPhrases),
        dispatched_at,
    );

    retry_on_lock("insert job set", 5000, || job_sets::insert_job_set(pool, &set)).await?;

    tracing::info!(
        correlation_id = %set.correlation_id,
        sentiment_job = %set.sentiment.external_job_id,
        entities_job = %set.entities.external_job_id,
        key_phrases_job = %set.key_phrases.external_job_id,
        "Dispatched analysis job set"
    );

    Ok(DispatchOutcome::Dispatched(set))
}
