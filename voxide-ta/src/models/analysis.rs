//! Analysis result types
//!
//! Field names follow the analytics engine's wire format (PascalCase result
//! payloads) and the canonical consolidated-artifact shape (camelCase
//! envelope), so these types serialize byte-for-byte into the documented
//! JSON without mapping layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use voxide_common::events::AnalysisPath;

/// Reference to a transcript artifact produced by the transcription stage
///
/// Immutable once created; this is the payload of the transcript-ready
/// event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptReference {
    /// Identifier derived from the originating audio object's name
    pub source_identifier: String,
    /// Store key of the transcript artifact
    pub transcript_location: String,
    /// Size of the transcript artifact in bytes (advisory; routing uses the
    /// extracted text length)
    pub byte_length: u64,
}

/// Overall sentiment classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

/// Per-class sentiment confidence scores
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SentimentScore {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub mixed: f64,
}

/// Sentiment detection result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentResult {
    #[serde(rename = "Sentiment")]
    pub sentiment: Sentiment,
    #[serde(rename = "SentimentScore", default)]
    pub sentiment_score: SentimentScore,
}

/// A single detected entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Entity {
    pub text: String,
    #[serde(rename = "Type")]
    pub entity_type: String,
    pub score: f64,
    pub begin_offset: usize,
    pub end_offset: usize,
}

/// Entity detection result with its count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySet {
    #[serde(rename = "Entities")]
    pub entities: Vec<Entity>,
    #[serde(rename = "Count", default)]
    pub count: usize,
}

impl EntitySet {
    pub fn new(entities: Vec<Entity>) -> Self {
        let count = entities.len();
        Self { entities, count }
    }
}

/// A single detected key phrase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyPhrase {
    pub text: String,
    pub score: f64,
    pub begin_offset: usize,
    pub end_offset: usize,
}

/// Key-phrase detection result with its count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPhraseSet {
    #[serde(rename = "KeyPhrases")]
    pub key_phrases: Vec<KeyPhrase>,
    #[serde(rename = "Count", default)]
    pub count: usize,
}

impl KeyPhraseSet {
    pub fn new(key_phrases: Vec<KeyPhrase>) -> Self {
        let count = key_phrases.len();
        Self { key_phrases, count }
    }
}

/// Language code and processing provenance attached to every artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub language_code: String,
    pub processing_timestamp: DateTime<Utc>,
}

/// The canonical consolidated output artifact
///
/// Produced exactly once per transcript-processing attempt, by either the
/// synchronous analyzer or the job-completion reconciler; written once and
/// never mutated after write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedAnalysis {
    /// `<sourceIdentifier>-<dispatch timestamp>`
    pub analysis_id: String,
    pub analysis_type: AnalysisPath,
    /// Store key of the transcript this analysis was derived from
    pub transcription_file: String,
    pub timestamp: DateTime<Utc>,
    /// Transcript length in characters
    pub text_length: usize,
    /// Transcript length in bytes
    pub text_bytes: u64,
    pub sentiment: SentimentResult,
    pub entities: EntitySet,
    pub key_phrases: KeyPhraseSet,
    pub metadata: AnalysisMetadata,
}

impl ConsolidatedAnalysis {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        analysis_id: String,
        analysis_type: AnalysisPath,
        transcription_file: String,
        text_length: usize,
        text_bytes: u64,
        sentiment: SentimentResult,
        entities: EntitySet,
        key_phrases: KeyPhraseSet,
        language_code: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            analysis_id,
            analysis_type,
            transcription_file,
            timestamp: now,
            text_length,
            text_bytes,
            sentiment,
            entities,
            key_phrases,
            metadata: AnalysisMetadata {
                language_code,
                processing_timestamp: now,
            },
        }
    }
}
