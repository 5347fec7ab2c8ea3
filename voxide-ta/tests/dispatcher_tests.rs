//! Asynchronous dispatch tests

mod helpers;

use helpers::{test_context, test_context_with, FakeAnalytics};
use voxide_common::events::AnalysisKind;
use voxide_ta::db::job_sets;
use voxide_ta::models::TranscriptReference;
use voxide_ta::pipeline::dispatcher::{dispatch_jobs, DispatchOutcome};
use voxide_ta::services::ObjectStore;

fn transcript(source: &str) -> TranscriptReference {
    TranscriptReference {
        source_identifier: source.to_string(),
        transcript_location: format!("transcripts/{}.json", source),
        byte_length: 8000,
    }
}

#[tokio::test]
async fn test_dispatch_submits_three_jobs_and_persists_record() {
    let ctx = test_context().await;
    let text = "b".repeat(8000);

    let outcome = dispatch_jobs(
        &ctx.state.db,
        ctx.store.as_ref(),
        ctx.analytics.as_ref(),
        &ctx.state.config.pipeline,
        "en-US",
        &transcript("tour-8k"),
        &text,
    )
    .await
    .unwrap();

    let set = match outcome {
        DispatchOutcome::Dispatched(set) => set,
        other => panic!("expected Dispatched, got {:?}", other),
    };

    // All three slots pending with distinct engine job ids
    assert!(set.any_pending());
    assert_ne!(set.sentiment.external_job_id, set.entities.external_job_id);
    assert_eq!(set.text_bytes, 8000);

    // One submission per kind, all sharing the correlation identifier
    let submitted = ctx.analytics.submitted_jobs();
    assert_eq!(submitted.len(), 3);
    for request in &submitted {
        assert!(
            request.job_name.contains(&set.correlation_id),
            "job name {} must carry the correlation id",
            request.job_name
        );
        assert!(request.output_location.contains(&set.correlation_id));
    }

    // Input text was staged for the engine's job workers
    let input_key = format!("analysis-input/{}.txt", set.correlation_id);
    assert_eq!(ctx.store.get(&input_key).await.unwrap(), text.as_bytes());

    // Record is discoverable by any of the three job ids
    for kind in AnalysisKind::ALL {
        let found = job_sets::find_by_external_job_id(
            &ctx.state.db,
            &set.slot(kind).external_job_id,
        )
        .await
        .unwrap()
        .expect("record must be discoverable by job id");
        assert_eq!(found.correlation_id, set.correlation_id);
    }
}

#[tokio::test]
async fn test_duplicate_dispatch_is_detected() {
    let ctx = test_context().await;
    let text = "b".repeat(8000);
    let reference = transcript("tour-redelivered");

    let first = dispatch_jobs(
        &ctx.state.db,
        ctx.store.as_ref(),
        ctx.analytics.as_ref(),
        &ctx.state.config.pipeline,
        "en-US",
        &reference,
        &text,
    )
    .await
    .unwrap();
    let first_id = match first {
        DispatchOutcome::Dispatched(set) => set.correlation_id,
        other => panic!("expected Dispatched, got {:?}", other),
    };

    // Redelivered transcript-ready event for the same source
    let second = dispatch_jobs(
        &ctx.state.db,
        ctx.store.as_ref(),
        ctx.analytics.as_ref(),
        &ctx.state.config.pipeline,
        "en-US",
        &reference,
        &text,
    )
    .await
    .unwrap();

    match second {
        DispatchOutcome::AlreadyInFlight { correlation_id } => {
            assert_eq!(correlation_id, first_id)
        }
        other => panic!("expected AlreadyInFlight, got {:?}", other),
    }

    // No second fan-out happened
    assert_eq!(ctx.analytics.submitted_jobs().len(), 3);
}

#[tokio::test]
async fn test_partial_submission_failure_persists_nothing() {
    let ctx = test_context_with(FakeAnalytics::failing_submit(AnalysisKind::KeyPhrases)).await;
    let text = "b".repeat(8000);
    let reference = transcript("tour-orphan");

    let result = dispatch_jobs(
        &ctx.state.db,
        ctx.store.as_ref(),
        ctx.analytics.as_ref(),
        &ctx.state.config.pipeline,
        "en-US",
        &reference,
        &text,
    )
    .await;

    assert!(result.is_err());

    // Sentiment and entities were submitted before the failure; they are
    // orphaned on the engine, and no record exists to match them
    assert_eq!(ctx.analytics.submitted_jobs().len(), 2);
    let in_flight = job_sets::find_in_flight_by_source(&ctx.state.db, "tour-orphan")
        .await
        .unwrap();
    assert!(in_flight.is_none());
}
