//! Dispatch-record state machine
//!
//! An `AnalysisJobSet` tracks one asynchronous dispatch: three independent
//! detection jobs converging on a single durable record. Slots transition
//! PENDING → COMPLETE | FAILED exactly once each; the set is retired when
//! the last slot leaves PENDING.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use voxide_common::events::AnalysisKind;
use voxide_common::{Error, Result};

/// Status of one job slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SlotStatus {
    Pending,
    Complete,
    Failed,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Pending => "PENDING",
            SlotStatus::Complete => "COMPLETE",
            SlotStatus::Failed => "FAILED",
        }
    }

    pub fn from_db(value: &str) -> Result<Self> {
        match value {
            "PENDING" => Ok(SlotStatus::Pending),
            "COMPLETE" => Ok(SlotStatus::Complete),
            "FAILED" => Ok(SlotStatus::Failed),
            other => Err(Error::Internal(format!("Unknown slot status: {}", other))),
        }
    }
}

/// Lifecycle state of the whole record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobSetState {
    /// Dispatched, at least one slot still PENDING
    InFlight,
    /// All three slots COMPLETE; consolidated artifact written
    Aggregated,
    /// At least one slot FAILED; no artifact written
    Failed,
}

impl JobSetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobSetState::InFlight => "IN_FLIGHT",
            JobSetState::Aggregated => "AGGREGATED",
            JobSetState::Failed => "FAILED",
        }
    }

    pub fn from_db(value: &str) -> Result<Self> {
        match value {
            "IN_FLIGHT" => Ok(JobSetState::InFlight),
            "AGGREGATED" => Ok(JobSetState::Aggregated),
            "FAILED" => Ok(JobSetState::Failed),
            other => Err(Error::Internal(format!("Unknown job set state: {}", other))),
        }
    }
}

/// One analysis-kind tracking field inside a dispatch record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSlot {
    /// Job identifier assigned by the analytics engine
    pub external_job_id: String,
    pub status: SlotStatus,
    /// Output prefix reported by the completion event; set once COMPLETE
    pub result_location: Option<String>,
}

impl JobSlot {
    pub fn pending(external_job_id: String) -> Self {
        Self {
            external_job_id,
            status: SlotStatus::Pending,
            result_location: None,
        }
    }
}

/// The dispatch record: the only shared mutable state of the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJobSet {
    /// Shared by all three jobs of one dispatch attempt
    pub correlation_id: String,
    pub source_identifier: String,
    pub transcript_location: String,
    pub state: JobSetState,
    /// Optimistic-concurrency counter; every mutation is conditioned on it
    pub version: i64,
    /// Transcript length in characters, captured at dispatch for the final
    /// artifact
    pub text_length: usize,
    /// Transcript length in bytes, captured at dispatch
    pub text_bytes: u64,
    pub sentiment: JobSlot,
    pub entities: JobSlot,
    pub key_phrases: JobSlot,
    pub dispatched_at: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
}

impl AnalysisJobSet {
    /// Create a fresh record with all three slots PENDING.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source_identifier: String,
        transcript_location: String,
        text_length: usize,
        text_bytes: u64,
        sentiment_job_id: String,
        entities_job_id: String,
        key_phrases_job_id: String,
        dispatched_at: DateTime<Utc>,
    ) -> Self {
        let correlation_id = Self::correlation_id_for(&source_identifier, dispatched_at);
        Self {
            correlation_id,
            source_identifier,
            transcript_location,
            state: JobSetState::InFlight,
            version: 0,
            text_length,
            text_bytes,
            sentiment: JobSlot::pending(sentiment_job_id),
            entities: JobSlot::pending(entities_job_id),
            key_phrases: JobSlot::pending(key_phrases_job_id),
            dispatched_at,
            retired_at: None,
        }
    }

    /// Correlation identifier shared by all artifacts of one dispatch
    /// attempt: `<sourceIdentifier>-<YYYYMMDD-HHMMSS>`.
    pub fn correlation_id_for(source_identifier: &str, dispatched_at: DateTime<Utc>) -> String {
        format!(
            "{}-{}",
            source_identifier,
            dispatched_at.format("%Y%m%d-%H%M%S")
        )
    }

    pub fn slot(&self, kind: AnalysisKind) -> &JobSlot {
        match kind {
            AnalysisKind::Sentiment => &self.sentiment,
            AnalysisKind::Entities => &self.entities,
            AnalysisKind::KeyPhrases => &self.key_phrases,
        }
    }

    pub fn slot_mut(&mut self, kind: AnalysisKind) -> &mut JobSlot {
        match kind {
            AnalysisKind::Sentiment => &mut self.sentiment,
            AnalysisKind::Entities => &mut self.entities,
            AnalysisKind::KeyPhrases => &mut self.key_phrases,
        }
    }

    /// Which slot owns the given external job identifier, if any.
    pub fn kind_for_job(&self, external_job_id: &str) -> Option<AnalysisKind> {
        AnalysisKind::ALL
            .into_iter()
            .find(|kind| self.slot(*kind).external_job_id == external_job_id)
    }

    pub fn any_pending(&self) -> bool {
        AnalysisKind::ALL
            .into_iter()
            .any(|kind| self.slot(kind).status == SlotStatus::Pending)
    }

    pub fn all_complete(&self) -> bool {
        AnalysisKind::ALL
            .into_iter()
            .all(|kind| self.slot(kind).status == SlotStatus::Complete)
    }

    pub fn failed_kinds(&self) -> Vec<AnalysisKind> {
        AnalysisKind::ALL
            .into_iter()
            .filter(|kind| self.slot(*kind).status == SlotStatus::Failed)
            .collect()
    }

    /// Apply a slot transition to this in-memory view, mirroring the
    /// conditional update performed against the database.
    pub fn apply_transition(
        &mut self,
        kind: AnalysisKind,
        status: SlotStatus,
        result_location: Option<String>,
    ) {
        let slot = self.slot_mut(kind);
        slot.status = status;
        if result_location.is_some() {
            slot.result_location = result_location;
        }
        self.version += 1;
    }
}
