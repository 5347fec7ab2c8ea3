//! Inline analysis for small transcripts
//!
//! Three blocking detection calls against the analytics engine, fail-fast.
//! A partial result is indistinguishable from a complete one downstream, so
//! the first failure aborts the whole attempt; the caller surfaces it as
//! retryable and nothing is written.

use crate::models::{Entity, KeyPhrase, SentimentResult};
use crate::services::{AnalyticsError, TextAnalytics};

pub async fn analyze_inline(
    analytics: &dyn TextAnalytics,
    text: &str,
    language_code: &str,
) -> Result<(SentimentResult, Vec<Entity>, Vec<KeyPhrase>), AnalyticsError> {
    tracing::info!(bytes = text.len(), "Starting inline analysis");

    let sentiment = analytics.detect_sentiment(text, language_code).await?;
    let entities = analytics.detect_entities(text, language_code).await?;
    let key_phrases = analytics.detect_key_phrases(text, language_code).await?;

    tracing::info!(
        sentiment = ?sentiment.sentiment,
        entity_count = entities.len(),
        key_phrase_count = key_phrases.len(),
        "Inline analysis complete"
    );

    Ok((sentiment, entities, key_phrases))
}
