//! Job-completion reconciliation
//!
//! Invoked once per completed detection job. Each invocation transitions
//! exactly one slot of the owning dispatch record under a version-
//! conditioned update, then re-evaluates all three slots of the updated
//! record. The invocation whose transition takes the last slot out of
//! PENDING aggregates (or fails) the whole set; every other invocation
//! stops after recording its slot. Duplicate deliveries find their slot
//! already settled and are no-ops.

use sqlx::SqlitePool;

use crate::db::job_sets;
use crate::models::{
    AnalysisJobSet, ConsolidatedAnalysis, EntitySet, JobSetState, KeyPhraseSet, SentimentResult,
    SlotStatus,
};
use crate::pipeline::{result_writer, PipelineError};
use crate::services::ObjectStore;
use crate::utils::db_retry::retry_on_lock;
use voxide_common::events::{AnalysisKind, AnalysisPath, JobOutcome};

/// One job-completion notification, as delivered by the fabric
#[derive(Debug, Clone)]
pub struct JobCompletion {
    pub external_job_id: String,
    pub kind: AnalysisKind,
    pub outcome: JobOutcome,
    /// Output prefix the engine wrote results under; present on success
    pub result_location: Option<String>,
}

/// What this invocation did with the event
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// No dispatch record owns this job id: a matching failure. Reported,
    /// never retried; nothing was mutated.
    NoMatchingSet,
    /// The owning record is already retired; late or duplicate delivery.
    AlreadyRetired { correlation_id: String },
    /// The slot had already left PENDING; duplicate delivery, no-op.
    Duplicate { correlation_id: String },
    /// Slot recorded; siblings still pending.
    Recorded { correlation_id: String },
    /// This was the third slot and all three are COMPLETE; consolidated
    /// artifact written and record retired.
    Aggregated {
        correlation_id: String,
        output_location: String,
    },
    /// This was the third slot and at least one is FAILED; record retired,
    /// no artifact written.
    SetFailed {
        correlation_id: String,
        failed_kinds: Vec<AnalysisKind>,
    },
}

pub async fn handle_completion(
    pool: &SqlitePool,
    store: &dyn ObjectStore,
    analysis_prefix: &str,
    language_code: &str,
    completion: &JobCompletion,
) -> Result<ReconcileOutcome, PipelineError> {
    loop {
        let Some(set) =
            job_sets::find_by_external_job_id(pool, &completion.external_job_id).await?
        else {
            tracing::error!(
                external_job_id = %completion.external_job_id,
                kind = %completion.kind,
                "Completion event for unknown job; no dispatch record matches"
            );
            return Ok(ReconcileOutcome::NoMatchingSet);
        };

        // The record is authoritative about which slot owns the job id; a
        // disagreeing event kind is logged and overridden.
        let kind = match set.kind_for_job(&completion.external_job_id) {
            Some(kind) => kind,
            None => {
                return Err(PipelineError::Common(voxide_common::Error::Internal(
                    format!(
                        "Reverse lookup returned record {} without job {}",
                        set.correlation_id, completion.external_job_id
                    ),
                )))
            }
        };
        if kind != completion.kind {
            tracing::warn!(
                correlation_id = %set.correlation_id,
                event_kind = %completion.kind,
                record_kind = %kind,
                "Completion event kind disagrees with dispatch record"
            );
        }

        if set.state != JobSetState::InFlight {
            tracing::info!(
                correlation_id = %set.correlation_id,
                state = ?set.state,
                "Completion event for already-retired job set; ignoring"
            );
            return Ok(ReconcileOutcome::AlreadyRetired {
                correlation_id: set.correlation_id,
            });
        }

        if set.slot(kind).status != SlotStatus::Pending {
            tracing::info!(
                correlation_id = %set.correlation_id,
                kind = %kind,
                "Duplicate completion event; slot already settled"
            );
            return Ok(ReconcileOutcome::Duplicate {
                correlation_id: set.correlation_id,
            });
        }

        let status = match completion.outcome {
            JobOutcome::Succeeded => SlotStatus::Complete,
            JobOutcome::Failed => SlotStatus::Failed,
        };

        let transitioned = retry_on_lock("transition slot", 5000, || {
            job_sets::transition_slot(
                pool,
                &set.correlation_id,
                kind,
                status,
                completion.result_location.as_deref(),
                set.version,
            )
        })
        .await?;

        if !transitioned {
            // A sibling's event moved the version underneath us; re-read
            // and try again against the fresh record.
            tracing::debug!(
                correlation_id = %set.correlation_id,
                kind = %kind,
                expected_version = set.version,
                "Slot transition lost a version race, retrying"
            );
            continue;
        }

        let mut updated = set;
        updated.apply_transition(kind, status, completion.result_location.clone());

        tracing::info!(
            correlation_id = %updated.correlation_id,
            kind = %kind,
            status = ?status,
            "Recorded job completion"
        );

        if updated.any_pending() {
            return Ok(ReconcileOutcome::Recorded {
                correlation_id: updated.correlation_id,
            });
        }

        // This invocation settled the last slot; it alone aggregates.
        if updated.all_complete() {
            let analysis = aggregate(store, &updated, language_code).await?;
            let output_location = result_writer::write_consolidated(
                store,
                analysis_prefix,
                &updated.source_identifier,
                &analysis,
            )
            .await?;

            if !job_sets::retire_job_set(
                pool,
                &updated.correlation_id,
                JobSetState::Aggregated,
                updated.version,
            )
            .await?
            {
                tracing::warn!(
                    correlation_id = %updated.correlation_id,
                    "Job set retirement raced with a concurrent update"
                );
            }

            tracing::info!(
                correlation_id = %updated.correlation_id,
                output_location = %output_location,
                "Aggregated consolidated analysis"
            );

            return Ok(ReconcileOutcome::Aggregated {
                correlation_id: updated.correlation_id,
                output_location,
            });
        }

        let failed_kinds = updated.failed_kinds();
        tracing::error!(
            correlation_id = %updated.correlation_id,
            failed_kinds = ?failed_kinds,
            "Analysis job set failed; discarding partial results"
        );

        if !job_sets::retire_job_set(
            pool,
            &updated.correlation_id,
            JobSetState::Failed,
            updated.version,
        )
        .await?
        {
            tracing::warn!(
                correlation_id = %updated.correlation_id,
                "Job set retirement raced with a concurrent update"
            );
        }

        return Ok(ReconcileOutcome::SetFailed {
            correlation_id: updated.correlation_id,
            failed_kinds,
        });
    }
}

/// Fetch the three job outputs and merge them into the consolidated
/// artifact. Only called with a record whose slots are all COMPLETE.
async fn aggregate(
    store: &dyn ObjectStore,
    set: &AnalysisJobSet,
    language_code: &str,
) -> Result<ConsolidatedAnalysis, PipelineError> {
    let sentiment: SentimentResult =
        read_job_output(store, result_location(set, AnalysisKind::Sentiment)?).await?;
    let entities: EntitySet =
        read_job_output(store, result_location(set, AnalysisKind::Entities)?).await?;
    let key_phrases: KeyPhraseSet =
        read_job_output(store, result_location(set, AnalysisKind::KeyPhrases)?).await?;

    Ok(ConsolidatedAnalysis::new(
        set.correlation_id.clone(),
        AnalysisPath::Asynchronous,
        set.transcript_location.clone(),
        set.text_length,
        set.text_bytes,
        sentiment,
        EntitySet::new(entities.entities),
        KeyPhraseSet::new(key_phrases.key_phrases),
        language_code.to_string(),
    ))
}

fn result_location(set: &AnalysisJobSet, kind: AnalysisKind) -> Result<&str, PipelineError> {
    set.slot(kind)
        .result_location
        .as_deref()
        .ok_or_else(|| {
            PipelineError::Common(voxide_common::Error::Internal(format!(
                "Slot {} of {} is COMPLETE without a result location",
                kind, set.correlation_id
            )))
        })
}

/// Read one job's output artifact from its result prefix.
///
/// The engine writes files with generated names under the prefix, one JSON
/// record per line; the first record of the first recognized file is the
/// result for a single-document job.
async fn read_job_output<T: serde::de::DeserializeOwned>(
    store: &dyn ObjectStore,
    location: &str,
) -> Result<T, PipelineError> {
    let keys = store.list(location).await?;
    let key = keys
        .iter()
        .find(|k| {
            k.ends_with(".out") || k.ends_with(".json") || k.ends_with(".jsonl")
        })
        .ok_or_else(|| PipelineError::MissingJobOutput {
            location: location.to_string(),
        })?;

    let bytes = store.get(key).await?;
    let text =
        String::from_utf8(bytes).map_err(|e| PipelineError::MalformedJobOutput {
            location: key.clone(),
            reason: format!("not valid UTF-8: {}", e),
        })?;

    let first_line = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| PipelineError::MalformedJobOutput {
            location: key.clone(),
            reason: "no result records".to_string(),
        })?;

    serde_json::from_str(first_line).map_err(|e| PipelineError::MalformedJobOutput {
        location: key.clone(),
        reason: e.to_string(),
    })
}
