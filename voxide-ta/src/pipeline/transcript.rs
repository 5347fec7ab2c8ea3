//! Transcript artifact loading and text extraction
//!
//! The transcription stage writes its engine's native output format: a JSON
//! document with the spoken text nested under `results.transcripts`. Plain
//! UTF-8 text artifacts are accepted as-is, so re-processing a previously
//! extracted transcript also works.

use serde::Deserialize;
use thiserror::Error;

use crate::services::{ObjectStore, StoreError};

/// Transcript loading errors; all of these surface immediately to the
/// caller, before anything is dispatched.
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("Transcript artifact not found: {0}")]
    Missing(String),

    #[error("Transcript contains no text")]
    Empty,

    #[error("Transcript artifact is malformed: {0}")]
    Malformed(String),

    #[error("Store error reading transcript: {0}")]
    Store(String),
}

#[derive(Debug, Deserialize)]
struct TranscriptDocument {
    results: TranscriptResults,
}

#[derive(Debug, Deserialize)]
struct TranscriptResults {
    #[serde(default)]
    transcripts: Vec<TranscriptEntry>,
}

#[derive(Debug, Deserialize)]
struct TranscriptEntry {
    #[serde(default)]
    transcript: String,
}

/// Extract plain transcript text from a raw artifact.
///
/// A document in the speech-to-text engine's format yields its first
/// transcript entry; anything that is not such a document is treated as
/// plain text. Empty text is an error either way.
pub fn extract_transcript_text(raw: &[u8]) -> Result<String, TranscriptError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| TranscriptError::Malformed(format!("not valid UTF-8: {}", e)))?;

    let extracted = match serde_json::from_str::<TranscriptDocument>(text) {
        Ok(document) => document
            .results
            .transcripts
            .into_iter()
            .next()
            .map(|entry| entry.transcript)
            .unwrap_or_default(),
        Err(_) => text.to_string(),
    };

    if extracted.trim().is_empty() {
        return Err(TranscriptError::Empty);
    }

    Ok(extracted)
}

/// Load a transcript artifact from the store and extract its text.
pub async fn load_transcript_text(
    store: &dyn ObjectStore,
    location: &str,
) -> Result<String, TranscriptError> {
    let raw = match store.get(location).await {
        Ok(raw) => raw,
        Err(StoreError::NotFound(key)) => return Err(TranscriptError::Missing(key)),
        Err(e) => return Err(TranscriptError::Store(e.to_string())),
    };

    extract_transcript_text(&raw)
}
