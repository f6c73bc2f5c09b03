use cohort::{
    error::PipelineErrorKind,
    messaging::{headers, topics},
};

use crate::support::{resource_delivery_json, runtime_harness};

#[tokio::test]
async fn full_cycle_runs_through_the_lanes() {
    let h = runtime_harness(0);

    let ack = h
        .runtime
        .dispatch_raw(
            topics::RESOURCE_NORMALIZED,
            "fac-1".to_string(),
            Some("c1".to_string()),
            resource_delivery_json("obs-1", false),
        )
        .await
        .expect("dispatch");
    ack.await.expect("ack after handling");

    let ack = h
        .runtime
        .dispatch_raw(
            topics::RESOURCE_NORMALIZED,
            "fac-1".to_string(),
            Some("c1".to_string()),
            resource_delivery_json("obs-1", true),
        )
        .await
        .expect("dispatch");
    ack.await.expect("ack after handling");

    assert_eq!(h.correlation_store.record_count(), 1);
    assert_eq!(h.evaluator.invocation_count(), 1);
    assert_eq!(h.publisher.sent_to(topics::RESOURCE_EVALUATED).len(), 1);
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn error_and_retry_topic_variants_share_the_delivery_shape() {
    let h = runtime_harness(0);

    for topic in [
        topics::RESOURCE_NORMALIZED_RETRY,
        topics::RESOURCE_ACQUIRED_ERROR,
    ] {
        let ack = h
            .runtime
            .dispatch_raw(
                topic,
                "fac-1".to_string(),
                Some("c1".to_string()),
                resource_delivery_json("obs-1", false),
            )
            .await
            .expect("dispatch");
        ack.await.expect("ack");
    }

    assert_eq!(h.correlation_store.record_count(), 1);
    assert_eq!(h.resource_store.resource_count(), 1, "same tuple upserts");
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn unknown_query_phase_is_fatal_and_forwarded() {
    let h = runtime_harness(0);

    let mut payload = resource_delivery_json("obs-1", false);
    payload["queryPhase"] = serde_json::json!("TERTIARY");
    let ack = h
        .runtime
        .dispatch_raw(
            topics::RESOURCE_NORMALIZED,
            "fac-1".to_string(),
            Some("c1".to_string()),
            payload.clone(),
        )
        .await
        .expect("boundary failures still resolve to an ack");
    ack.await.expect("ack");

    let forwarded = h.publisher.sent_to("ResourceNormalized-Error");
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].value, payload, "raw payload is forwarded");
    assert_eq!(
        forwarded[0].header(headers::ERROR_KIND),
        Some("UnexpectedPhase")
    );
    assert_eq!(h.correlation_store.record_count(), 0, "no state mutated");
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn validation_failure_routes_to_error_topic_and_acks() {
    let h = runtime_harness(0);

    // Well-formed shape, but no scheduled reports: the aggregator rejects
    // it and the lane hands it to recovery before acking.
    let mut payload = resource_delivery_json("obs-1", false);
    payload["scheduledReports"] = serde_json::json!([]);
    let ack = h
        .runtime
        .dispatch_raw(
            topics::RESOURCE_NORMALIZED,
            "fac-1".to_string(),
            Some("c1".to_string()),
            payload,
        )
        .await
        .expect("dispatch");
    ack.await.expect("failed deliveries still ack");

    let forwarded = h.publisher.sent_to("ResourceNormalized-Error");
    assert_eq!(forwarded.len(), 1);
    assert_eq!(
        forwarded[0].header(headers::ERROR_MESSAGE),
        Some("scheduled reports are missing or empty")
    );
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn missing_correlation_header_fails_the_delivery() {
    let h = runtime_harness(0);

    let ack = h
        .runtime
        .dispatch_raw(
            topics::RESOURCE_NORMALIZED,
            "fac-1".to_string(),
            None,
            resource_delivery_json("obs-1", false),
        )
        .await
        .expect("dispatch");
    ack.await.expect("ack");

    let forwarded = h.publisher.sent_to("ResourceNormalized-Error");
    assert_eq!(forwarded.len(), 1);
    assert_eq!(
        forwarded[0].header(headers::ERROR_MESSAGE),
        Some("correlation id header is missing")
    );
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn reevaluation_requests_ride_their_own_lane() {
    let h = runtime_harness(0);

    // No prior aggregation exists, so this is the logged no-op path; the
    // delivery still acks and produces nothing.
    let ack = h
        .runtime
        .dispatch_raw(
            topics::EVALUATION_REQUESTED,
            "fac-1".to_string(),
            Some("corr-new".to_string()),
            serde_json::json!({
                "patientId": "pat-1",
                "previousReportId": "track-1",
                "reportTrackingId": "track-9",
            }),
        )
        .await
        .expect("dispatch");
    ack.await.expect("ack");

    assert_eq!(h.correlation_store.record_count(), 0);
    assert!(h.publisher.sent().is_empty());
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn unsubscribed_topic_is_rejected() {
    let h = runtime_harness(0);

    let err = h
        .runtime
        .dispatch_raw(
            "SomeOtherTopic",
            "fac-1".to_string(),
            Some("c1".to_string()),
            serde_json::json!({}),
        )
        .await
        .expect_err("no lane subscribes");
    assert_eq!(err.kind, PipelineErrorKind::Transport);
    h.runtime.shutdown().await;
}

#[tokio::test]
async fn shutdown_rejects_further_dispatches() {
    let h = runtime_harness(0);
    h.runtime.shutdown().await;

    let err = h
        .runtime
        .dispatch_raw(
            topics::RESOURCE_NORMALIZED,
            "fac-1".to_string(),
            Some("c1".to_string()),
            resource_delivery_json("obs-1", false),
        )
        .await
        .expect_err("lanes are closed");
    assert_eq!(err.kind, PipelineErrorKind::Transport);
}
