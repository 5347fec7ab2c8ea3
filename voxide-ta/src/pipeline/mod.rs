//! The pipeline coordinator
//!
//! Decides how each transcript is routed (inline analysis vs. fanned-out
//! detection jobs), tracks the jobs the asynchronous path spawns, and
//! reconciles their completions into one consolidated artifact.

pub mod classifier;
pub mod dispatcher;
pub mod reconciler;
pub mod result_writer;
pub mod sync_analyzer;
pub mod transcript;

use thiserror::Error;

use crate::models::{ConsolidatedAnalysis, EntitySet, KeyPhraseSet, TranscriptReference};
use crate::services::{AnalyticsError, ObjectStore, StoreError, TextAnalytics};
use transcript::TranscriptError;
use voxide_common::events::AnalysisPath;

/// Errors raised inside the coordinator
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("No job output found under {location}")]
    MissingJobOutput { location: String },

    #[error("Malformed job output at {location}: {reason}")]
    MalformedJobOutput { location: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Common(#[from] voxide_common::Error),
}

/// Run the synchronous path end to end: three inline detections, merge,
/// write. Fail-fast; on any error nothing has been written and the caller
/// surfaces a retryable failure.
///
/// Returns the consolidated analysis and the store key it was written to.
pub async fn run_sync_analysis(
    analytics: &dyn TextAnalytics,
    store: &dyn ObjectStore,
    analysis_prefix: &str,
    language_code: &str,
    transcript: &TranscriptReference,
    text: &str,
    analysis_id: String,
) -> Result<(ConsolidatedAnalysis, String), PipelineError> {
    let (sentiment, entities, key_phrases) =
        sync_analyzer::analyze_inline(analytics, text, language_code).await?;

    let analysis = ConsolidatedAnalysis::new(
        analysis_id,
        AnalysisPath::Synchronous,
        transcript.transcript_location.clone(),
        text.chars().count(),
        text.len() as u64,
        sentiment,
        EntitySet::new(entities),
        KeyPhraseSet::new(key_phrases),
        language_code.to_string(),
    );

    let output_location = result_writer::write_consolidated(
        store,
        analysis_prefix,
        &transcript.source_identifier,
        &analysis,
    )
    .await?;

    Ok((analysis, output_location))
}
