//! Event types for the Voxide pipeline event system
//!
//! Provides shared event definitions and the EventBus used by all Voxide
//! services. Events are broadcast in-process and can be serialized for SSE
//! transmission to operator UIs.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// The three text-analytics capabilities tracked by the coordinator.
///
/// Each asynchronous dispatch fans out into exactly one job per kind; the
/// kind also names the slot inside an analysis job set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisKind {
    Sentiment,
    Entities,
    /// Accepts the fabric's hyphenated spelling on the way in
    #[serde(alias = "key-phrases")]
    KeyPhrases,
}

impl AnalysisKind {
    /// All kinds, in canonical order.
    pub const ALL: [AnalysisKind; 3] = [
        AnalysisKind::Sentiment,
        AnalysisKind::Entities,
        AnalysisKind::KeyPhrases,
    ];

    /// Stable lowercase name used in job names and storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Sentiment => "sentiment",
            AnalysisKind::Entities => "entities",
            AnalysisKind::KeyPhrases => "key-phrases",
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which processing strategy produced a consolidated analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisPath {
    Synchronous,
    Asynchronous,
}

/// Outcome reported by a job-completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobOutcome {
    Succeeded,
    Failed,
}

/// Voxide pipeline events
///
/// Broadcast via EventBus and forwarded over SSE. One event per observable
/// coordinator decision; handlers emit, the SSE bridge and tests subscribe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// A transcript was classified and routed down one of the two paths
    AnalysisRouted {
        source_identifier: String,
        text_bytes: u64,
        path: AnalysisPath,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Synchronous path finished and the consolidated artifact was written
    SyncAnalysisCompleted {
        analysis_id: String,
        output_location: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Three analysis jobs were submitted and the dispatch record persisted
    JobsDispatched {
        correlation_id: String,
        sentiment_job_id: String,
        entities_job_id: String,
        key_phrases_job_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One slot of a dispatch record left PENDING
    JobCompletionRecorded {
        correlation_id: String,
        kind: AnalysisKind,
        outcome: JobOutcome,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// All three slots COMPLETE; consolidated artifact written, record retired
    AnalysisAggregated {
        correlation_id: String,
        output_location: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// At least one slot FAILED; no artifact written, record retired
    AnalysisFailed {
        correlation_id: String,
        failed_kinds: Vec<AnalysisKind>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A completion event named a job no dispatch record knows about
    MatchingFailure {
        external_job_id: String,
        kind: AnalysisKind,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PipelineEvent {
    /// Event type name for SSE `event:` fields and logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::AnalysisRouted { .. } => "AnalysisRouted",
            PipelineEvent::SyncAnalysisCompleted { .. } => "SyncAnalysisCompleted",
            PipelineEvent::JobsDispatched { .. } => "JobsDispatched",
            PipelineEvent::JobCompletionRecorded { .. } => "JobCompletionRecorded",
            PipelineEvent::AnalysisAggregated { .. } => "AnalysisAggregated",
            PipelineEvent::AnalysisFailed { .. } => "AnalysisFailed",
            PipelineEvent::MatchingFailure { .. } => "MatchingFailure",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for pipeline events
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity.
    ///
    /// Recommended values: 1000 for services, 10-100 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events.
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PipelineEvent,
    ) -> Result<usize, broadcast::error::SendError<PipelineEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening.
    ///
    /// Pipeline handlers use this form: events are observability, not
    /// control flow, so an empty bus is not an error.
    pub fn emit_lossy(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
