//! Consolidated-artifact serialization and storage
//!
//! Writes to `<analysis_prefix><sourceIdentifier>-analysis.json`. The write
//! is an idempotent upsert; retried attempts overwrite the same key rather
//! than appending new artifacts.

use crate::models::ConsolidatedAnalysis;
use crate::pipeline::PipelineError;
use crate::services::ObjectStore;

pub async fn write_consolidated(
    store: &dyn ObjectStore,
    analysis_prefix: &str,
    source_identifier: &str,
    analysis: &ConsolidatedAnalysis,
) -> Result<String, PipelineError> {
    let key = format!("{}{}-analysis.json", analysis_prefix, source_identifier);

    let body = serde_json::to_vec_pretty(analysis)
        .map_err(|e| PipelineError::Serialization(e.to_string()))?;

    store.put(&key, &body).await?;

    tracing::info!(
        analysis_id = %analysis.analysis_id,
        analysis_type = ?analysis.analysis_type,
        output_location = %key,
        "Consolidated analysis written"
    );

    Ok(key)
}
