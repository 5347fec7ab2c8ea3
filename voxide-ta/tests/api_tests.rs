//! HTTP API integration tests
//!
//! Drives the router end to end with in-process requests: classification
//! boundary behavior, both processing paths, matching failures, and the
//! status endpoints.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use helpers::{
    entities_output_record, key_phrases_output_record, put_engine_transcript, put_job_output,
    sentiment_output_record, test_context, test_context_with, FakeAnalytics,
};
use voxide_common::events::AnalysisKind;
use voxide_ta::services::ObjectStore;

async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn transcript_ready_event(source: &str) -> serde_json::Value {
    serde_json::json!({
        "sourceIdentifier": source,
        "transcriptLocation": format!("transcripts/{}.json", source),
        "byteLength": 0
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let ctx = test_context().await;
    let app = voxide_ta::build_router(ctx.state.clone());

    let (status, body) = send(app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "voxide-ta");
}

#[tokio::test]
async fn test_transcript_ready_rejects_blank_source() {
    let ctx = test_context().await;
    let app = voxide_ta::build_router(ctx.state.clone());

    let (status, body) = send(
        app,
        "POST",
        "/events/transcript-ready",
        Some(serde_json::json!({
            "sourceIdentifier": "  ",
            "transcriptLocation": "transcripts/x.json",
            "byteLength": 10
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_transcript_ready_rejects_missing_artifact() {
    let ctx = test_context().await;
    let app = voxide_ta::build_router(ctx.state.clone());

    let (status, _) = send(
        app,
        "POST",
        "/events/transcript-ready",
        Some(transcript_ready_event("tour-missing")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ctx.analytics.detect_call_count(), 0);
}

#[tokio::test]
async fn test_small_transcript_takes_synchronous_path() {
    let ctx = test_context().await;
    put_engine_transcript(&ctx.store, "transcripts/tour-small.json", 3000).await;
    let app = voxide_ta::build_router(ctx.state.clone());

    let (status, body) = send(
        app,
        "POST",
        "/events/transcript-ready",
        Some(transcript_ready_event("tour-small")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analysisType"], "synchronous");
    assert_eq!(body["status"], "COMPLETED");

    let output_location = body["outputLocation"].as_str().unwrap();
    assert_eq!(output_location, "analysis/tour-small-analysis.json");
    let artifact: serde_json::Value =
        serde_json::from_slice(&ctx.store.get(output_location).await.unwrap()).unwrap();
    assert_eq!(artifact["analysisType"], "synchronous");
    assert_eq!(artifact["textBytes"], 3000);
}

#[tokio::test]
async fn test_inline_failure_is_retryable() {
    let ctx = test_context_with(FakeAnalytics::failing_detect(AnalysisKind::Sentiment)).await;
    put_engine_transcript(&ctx.store, "transcripts/tour-err.json", 3000).await;
    let app = voxide_ta::build_router(ctx.state.clone());

    let (status, body) = send(
        app,
        "POST",
        "/events/transcript-ready",
        Some(transcript_ready_event("tour-err")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
    assert!(
        !ctx.store
            .exists("analysis/tour-err-analysis.json")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_large_transcript_flows_through_async_path() {
    let ctx = test_context().await;
    put_engine_transcript(&ctx.store, "transcripts/tour-large.json", 8000).await;
    let app = voxide_ta::build_router(ctx.state.clone());

    // Dispatch
    let (status, body) = send(
        app.clone(),
        "POST",
        "/events/transcript-ready",
        Some(transcript_ready_event("tour-large")),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["analysisType"], "asynchronous");
    assert_eq!(body["status"], "IN_PROGRESS");

    let correlation_id = body["analysisId"].as_str().unwrap().to_string();
    let job_ids = [
        (
            AnalysisKind::Entities,
            body["jobIds"]["entities"].as_str().unwrap().to_string(),
        ),
        (
            AnalysisKind::KeyPhrases,
            body["jobIds"]["keyPhrases"].as_str().unwrap().to_string(),
        ),
        (
            AnalysisKind::Sentiment,
            body["jobIds"]["sentiment"].as_str().unwrap().to_string(),
        ),
    ];

    // Stage the outputs the engine's jobs would have produced
    for (kind, _) in &job_ids {
        let location = format!("analysis-output/{}/{}/", correlation_id, kind.as_str());
        let record = match kind {
            AnalysisKind::Sentiment => sentiment_output_record(),
            AnalysisKind::Entities => entities_output_record(),
            AnalysisKind::KeyPhrases => key_phrases_output_record(),
        };
        put_job_output(&ctx.store, &location, record).await;
    }

    // Completions arrive one by one; output only after the third
    for (index, (kind, job_id)) in job_ids.iter().enumerate() {
        let kind_name = serde_json::to_value(kind).unwrap();
        let (status, body) = send(
            app.clone(),
            "POST",
            "/events/job-completed",
            Some(serde_json::json!({
                "externalJobId": job_id,
                "jobKind": kind_name,
                "outcome": "SUCCEEDED",
                "resultLocation": format!(
                    "analysis-output/{}/{}/", correlation_id, kind.as_str()
                )
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        if index < 2 {
            assert_eq!(body["status"], "RECORDED");
            assert!(
                !ctx.store
                    .exists("analysis/tour-large-analysis.json")
                    .await
                    .unwrap(),
                "no artifact before the third completion"
            );
        } else {
            assert_eq!(body["status"], "AGGREGATED");
            assert_eq!(body["outputLocation"], "analysis/tour-large-analysis.json");
        }
    }

    let artifact: serde_json::Value = serde_json::from_slice(
        &ctx.store
            .get("analysis/tour-large-analysis.json")
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(artifact["analysisType"], "asynchronous");
    assert_eq!(artifact["analysisId"], correlation_id.as_str());

    // Status endpoint reflects the retirement
    let (status, body) = send(
        app,
        "GET",
        &format!("/analyses/{}", correlation_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "AGGREGATED");
}

#[tokio::test]
async fn test_failed_job_reported_as_terminal() {
    let ctx = test_context().await;
    put_engine_transcript(&ctx.store, "transcripts/tour-bad.json", 8000).await;
    let app = voxide_ta::build_router(ctx.state.clone());

    let (_, body) = send(
        app.clone(),
        "POST",
        "/events/transcript-ready",
        Some(transcript_ready_event("tour-bad")),
    )
    .await;
    let correlation_id = body["analysisId"].as_str().unwrap().to_string();

    // entities job fails, siblings succeed
    let completions = [
        ("entities", body["jobIds"]["entities"].as_str().unwrap(), "FAILED"),
        ("sentiment", body["jobIds"]["sentiment"].as_str().unwrap(), "SUCCEEDED"),
        ("keyPhrases", body["jobIds"]["keyPhrases"].as_str().unwrap(), "SUCCEEDED"),
    ];
    for (kind, job_id, outcome) in completions {
        let kind_str = match kind {
            "keyPhrases" => "key-phrases",
            other => other,
        };
        let location = format!("analysis-output/{}/{}/", correlation_id, kind_str);
        if outcome == "SUCCEEDED" {
            put_job_output(&ctx.store, &location, sentiment_output_record()).await;
        }
        let mut event = serde_json::json!({
            "externalJobId": job_id,
            "jobKind": kind,
            "outcome": outcome,
        });
        if outcome == "SUCCEEDED" {
            event["resultLocation"] = serde_json::Value::String(location);
        }
        let (status, _) = send(app.clone(), "POST", "/events/job-completed", Some(event)).await;
        assert_eq!(status, StatusCode::OK);
    }

    // No artifact was ever written; the record is retired FAILED naming the
    // entities slot
    assert!(
        !ctx.store
            .exists("analysis/tour-bad-analysis.json")
            .await
            .unwrap()
    );
    let (status, body) = send(
        app,
        "GET",
        &format!("/analyses/{}", correlation_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "FAILED");
    assert_eq!(body["entities"]["status"], "FAILED");
}

#[tokio::test]
async fn test_unknown_job_completion_reports_matching_failure() {
    let ctx = test_context().await;
    let app = voxide_ta::build_router(ctx.state.clone());

    let (status, body) = send(
        app,
        "POST",
        "/events/job-completed",
        Some(serde_json::json!({
            "externalJobId": "job-from-nowhere",
            "jobKind": "sentiment",
            "outcome": "SUCCEEDED",
            "resultLocation": "analysis-output/ghost/sentiment/"
        })),
    )
    .await;

    // Reported, not retried: the fabric must not redeliver
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "NO_MATCHING_SET");
}

#[tokio::test]
async fn test_succeeded_completion_requires_result_location() {
    let ctx = test_context().await;
    let app = voxide_ta::build_router(ctx.state.clone());

    let (status, body) = send(
        app,
        "POST",
        "/events/job-completed",
        Some(serde_json::json!({
            "externalJobId": "job-x",
            "jobKind": "entities",
            "outcome": "SUCCEEDED"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_analysis_returns_404() {
    let ctx = test_context().await;
    let app = voxide_ta::build_router(ctx.state.clone());

    let (status, body) = send(app, "GET", "/analyses/nope-123", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
