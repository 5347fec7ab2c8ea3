//! Shared test fixtures: a scripted analytics engine, a temp-backed store,
//! and application state wiring.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

use voxide_common::config::TomlConfig;
use voxide_common::events::{AnalysisKind, EventBus};
use voxide_ta::models::{Entity, KeyPhrase, Sentiment, SentimentResult, SentimentScore};
use voxide_ta::services::{
    AnalyticsError, DetectionJobRequest, FsObjectStore, ObjectStore, TextAnalytics,
};
use voxide_ta::AppState;

/// Scripted analytics engine.
///
/// Returns canned detection results; can be told to fail one inline call or
/// one job submission. Records every submitted job for assertions.
pub struct FakeAnalytics {
    pub submitted: Mutex<Vec<DetectionJobRequest>>,
    pub fail_detect: Option<AnalysisKind>,
    pub fail_submit: Option<AnalysisKind>,
    detect_calls: AtomicUsize,
}

impl FakeAnalytics {
    pub fn new() -> Self {
        Self {
            submitted: Mutex::new(Vec::new()),
            fail_detect: None,
            fail_submit: None,
            detect_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_detect(kind: AnalysisKind) -> Self {
        Self {
            fail_detect: Some(kind),
            ..Self::new()
        }
    }

    pub fn failing_submit(kind: AnalysisKind) -> Self {
        Self {
            fail_submit: Some(kind),
            ..Self::new()
        }
    }

    pub fn detect_call_count(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub fn submitted_jobs(&self) -> Vec<DetectionJobRequest> {
        self.submitted.lock().unwrap().clone()
    }

    fn check_detect(&self, kind: AnalysisKind) -> Result<(), AnalyticsError> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_detect == Some(kind) {
            return Err(AnalyticsError::ApiError(
                500,
                format!("scripted {} failure", kind),
            ));
        }
        Ok(())
    }
}

pub fn canned_sentiment() -> SentimentResult {
    SentimentResult {
        sentiment: Sentiment::Positive,
        sentiment_score: SentimentScore {
            positive: 0.91,
            negative: 0.02,
            neutral: 0.05,
            mixed: 0.02,
        },
    }
}

pub fn canned_entities() -> Vec<Entity> {
    vec![Entity {
        text: "Alhambra".to_string(),
        entity_type: "LOCATION".to_string(),
        score: 0.98,
        begin_offset: 0,
        end_offset: 8,
    }]
}

pub fn canned_key_phrases() -> Vec<KeyPhrase> {
    vec![KeyPhrase {
        text: "the palace gardens".to_string(),
        score: 0.95,
        begin_offset: 12,
        end_offset: 30,
    }]
}

#[async_trait]
impl TextAnalytics for FakeAnalytics {
    async fn detect_sentiment(
        &self,
        _text: &str,
        _language_code: &str,
    ) -> Result<SentimentResult, AnalyticsError> {
        self.check_detect(AnalysisKind::Sentiment)?;
        Ok(canned_sentiment())
    }

    async fn detect_entities(
        &self,
        _text: &str,
        _language_code: &str,
    ) -> Result<Vec<Entity>, AnalyticsError> {
        self.check_detect(AnalysisKind::Entities)?;
        Ok(canned_entities())
    }

    async fn detect_key_phrases(
        &self,
        _text: &str,
        _language_code: &str,
    ) -> Result<Vec<KeyPhrase>, AnalyticsError> {
        self.check_detect(AnalysisKind::KeyPhrases)?;
        Ok(canned_key_phrases())
    }

    async fn start_detection_job(
        &self,
        request: DetectionJobRequest,
    ) -> Result<String, AnalyticsError> {
        if self.fail_submit == Some(request.kind) {
            return Err(AnalyticsError::ApiError(
                500,
                format!("scripted {} submission failure", request.kind),
            ));
        }
        let job_id = format!("{}-{}", request.kind.as_str(), Uuid::new_v4());
        self.submitted.lock().unwrap().push(request);
        Ok(job_id)
    }
}

/// Everything a test needs to drive the coordinator.
pub struct TestContext {
    pub state: AppState,
    pub store: Arc<FsObjectStore>,
    pub analytics: Arc<FakeAnalytics>,
    /// Keep the store root alive for the duration of the test
    pub dir: TempDir,
}

/// Wire up application state against a temp store and a file-backed test
/// database.
pub async fn test_context_with(analytics: FakeAnalytics) -> TestContext {
    let dir = TempDir::new().unwrap();

    let store = Arc::new(FsObjectStore::new(dir.path().join("store")).unwrap());
    let pool = voxide_common::db::init_database(&dir.path().join("voxide-test.db"))
        .await
        .unwrap();
    let analytics = Arc::new(analytics);

    let state = AppState::new(
        pool,
        EventBus::new(100),
        store.clone() as Arc<dyn ObjectStore>,
        analytics.clone() as Arc<dyn TextAnalytics>,
        Arc::new(TomlConfig::default()),
    );

    TestContext {
        state,
        store,
        analytics,
        dir,
    }
}

pub async fn test_context() -> TestContext {
    test_context_with(FakeAnalytics::new()).await
}

/// Write a transcript artifact in the speech-to-text engine's output
/// format, with a spoken text of exactly `text_bytes` bytes.
pub async fn put_engine_transcript(
    store: &FsObjectStore,
    location: &str,
    text_bytes: usize,
) -> String {
    let text = "a".repeat(text_bytes);
    let artifact = serde_json::json!({
        "jobName": "test",
        "results": {
            "transcripts": [{ "transcript": text }],
            "items": []
        }
    });
    store
        .put(location, artifact.to_string().as_bytes())
        .await
        .unwrap();
    text
}

/// Write a detection-job output artifact (single JSON-lines record) under
/// the given result prefix.
pub async fn put_job_output(store: &FsObjectStore, location: &str, record: serde_json::Value) {
    let key = format!("{}000000.out", location);
    store.put(&key, record.to_string().as_bytes()).await.unwrap();
}

pub fn sentiment_output_record() -> serde_json::Value {
    serde_json::json!({
        "Sentiment": "NEUTRAL",
        "SentimentScore": { "Positive": 0.2, "Negative": 0.1, "Neutral": 0.65, "Mixed": 0.05 }
    })
}

pub fn entities_output_record() -> serde_json::Value {
    serde_json::json!({
        "Entities": [
            { "Text": "Granada", "Type": "LOCATION", "Score": 0.97, "BeginOffset": 4, "EndOffset": 11 },
            { "Text": "Isabella", "Type": "PERSON", "Score": 0.88, "BeginOffset": 30, "EndOffset": 38 }
        ]
    })
}

pub fn key_phrases_output_record() -> serde_json::Value {
    serde_json::json!({
        "KeyPhrases": [
            { "Text": "the old fortress", "Score": 0.93, "BeginOffset": 15, "EndOffset": 31 }
        ]
    })
}
