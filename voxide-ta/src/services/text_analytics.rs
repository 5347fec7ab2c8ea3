//! Text-analytics service client
//!
//! The analytics engine exposes three request/response detection calls for
//! small texts and a job-submission API for large ones. The coordinator
//! only ever talks to it through the `TextAnalytics` trait; the HTTP client
//! here is the production implementation, tests substitute their own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use voxide_common::events::AnalysisKind;

use crate::models::{Entity, KeyPhrase, SentimentResult};

/// Text-analytics client errors
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Service throttled the request")]
    Throttled,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Parameters for one asynchronous detection job
#[derive(Debug, Clone)]
pub struct DetectionJobRequest {
    /// Job name, `<kind>-<correlationId>`; echoed back in engine listings
    pub job_name: String,
    pub kind: AnalysisKind,
    /// Store key of the staged input text
    pub input_location: String,
    /// Store prefix the engine writes its output under
    pub output_location: String,
    pub language_code: String,
}

/// The analytics engine's capabilities, as the coordinator sees them
#[async_trait]
pub trait TextAnalytics: Send + Sync {
    async fn detect_sentiment(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<SentimentResult, AnalyticsError>;

    async fn detect_entities(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Vec<Entity>, AnalyticsError>;

    async fn detect_key_phrases(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Vec<KeyPhrase>, AnalyticsError>;

    /// Submit a long-running detection job; returns the engine's job id.
    async fn start_detection_job(
        &self,
        request: DetectionJobRequest,
    ) -> Result<String, AnalyticsError>;
}

/// Reduce a BCP 47 tag to its primary subtag (`en-US` → `en`).
///
/// The job API accepts only primary subtags, unlike the inline calls.
pub fn primary_language_subtag(language_code: &str) -> &str {
    language_code
        .split('-')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(language_code)
}

#[derive(Debug, Serialize)]
struct DetectRequest<'a> {
    #[serde(rename = "Text")]
    text: &'a str,
    #[serde(rename = "LanguageCode")]
    language_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct EntitiesEnvelope {
    #[serde(rename = "Entities", default)]
    entities: Vec<Entity>,
}

#[derive(Debug, Deserialize)]
struct KeyPhrasesEnvelope {
    #[serde(rename = "KeyPhrases", default)]
    key_phrases: Vec<KeyPhrase>,
}

#[derive(Debug, Serialize)]
struct StartJobBody<'a> {
    #[serde(rename = "JobName")]
    job_name: &'a str,
    #[serde(rename = "JobKind")]
    kind: AnalysisKind,
    #[serde(rename = "InputLocation")]
    input_location: &'a str,
    #[serde(rename = "OutputLocation")]
    output_location: &'a str,
    #[serde(rename = "LanguageCode")]
    language_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct StartJobResponse {
    #[serde(rename = "JobId")]
    job_id: String,
}

/// HTTP client for the text-analytics engine
pub struct HttpTextAnalytics {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpTextAnalytics {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, AnalyticsError> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AnalyticsError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json<B: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, AnalyticsError> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AnalyticsError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 429 || status.as_u16() == 503 {
            return Err(AnalyticsError::Throttled);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AnalyticsError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| AnalyticsError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl TextAnalytics for HttpTextAnalytics {
    async fn detect_sentiment(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<SentimentResult, AnalyticsError> {
        tracing::debug!(bytes = text.len(), "Detecting sentiment inline");
        self.post_json(
            "detect-sentiment",
            &DetectRequest {
                text,
                language_code,
            },
        )
        .await
    }

    async fn detect_entities(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Vec<Entity>, AnalyticsError> {
        tracing::debug!(bytes = text.len(), "Detecting entities inline");
        let envelope: EntitiesEnvelope = self
            .post_json(
                "detect-entities",
                &DetectRequest {
                    text,
                    language_code,
                },
            )
            .await?;
        Ok(envelope.entities)
    }

    async fn detect_key_phrases(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Vec<KeyPhrase>, AnalyticsError> {
        tracing::debug!(bytes = text.len(), "Detecting key phrases inline");
        let envelope: KeyPhrasesEnvelope = self
            .post_json(
                "detect-key-phrases",
                &DetectRequest {
                    text,
                    language_code,
                },
            )
            .await?;
        Ok(envelope.key_phrases)
    }

    async fn start_detection_job(
        &self,
        request: DetectionJobRequest,
    ) -> Result<String, AnalyticsError> {
        let response: StartJobResponse = self
            .post_json(
                "jobs",
                &StartJobBody {
                    job_name: &request.job_name,
                    kind: request.kind,
                    input_location: &request.input_location,
                    output_location: &request.output_location,
                    language_code: primary_language_subtag(&request.language_code),
                },
            )
            .await?;

        tracing::info!(
            job_name = %request.job_name,
            job_id = %response.job_id,
            kind = %request.kind,
            "Started detection job"
        );

        Ok(response.job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_language_subtag() {
        assert_eq!(primary_language_subtag("en-US"), "en");
        assert_eq!(primary_language_subtag("de"), "de");
        assert_eq!(primary_language_subtag("pt-BR"), "pt");
    }

    #[test]
    fn test_client_creation() {
        let client = HttpTextAnalytics::new("http://localhost:8600/", Duration::from_secs(30));
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url, "http://localhost:8600");
    }

    #[test]
    fn test_start_job_body_wire_shape() {
        let body = StartJobBody {
            job_name: "entities-tour-42-20260101-120000",
            kind: AnalysisKind::Entities,
            input_location: "analysis-input/tour-42-20260101-120000.txt",
            output_location: "analysis-output/tour-42-20260101-120000/entities/",
            language_code: "en",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["JobName"], "entities-tour-42-20260101-120000");
        assert_eq!(json["JobKind"], "entities");
        assert_eq!(json["LanguageCode"], "en");
    }
}
