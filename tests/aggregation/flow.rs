use cohort::{
    model::QueryPhase,
    store::{CorrelationStore, ResourceStore},
};

use crate::support::{
    completion_event, evaluated_events, harness, observation, resource_event, second_wave_events,
};

#[tokio::test]
async fn non_terminal_event_accumulates_resource_and_creates_record() {
    let h = harness(0);

    h.aggregator
        .handle(
            "ResourceNormalized",
            "fac-1",
            "c1",
            &resource_event(Some("pat-1"), observation("obs-1", 42)),
        )
        .await
        .expect("handle");

    let resources = h
        .resource_store
        .find_by_correlation("fac-1", "c1")
        .await
        .expect("find");
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].resource_type, "Observation");
    assert_eq!(resources[0].resource_id, "obs-1");

    let record = h
        .correlation_store
        .find("fac-1", "c1")
        .await
        .expect("find")
        .expect("record must be created on first event");
    assert_eq!(record.patient_id.as_deref(), Some("pat-1"));
    assert_eq!(record.reports.len(), 1);
    assert_eq!(record.reports[0].report_type, "hypo");
    assert_eq!(record.reports[0].report_tracking_id, "track-1");
    assert!(record.reports[0].reportable.is_none());

    // Non-terminal events never reach evaluation.
    assert_eq!(h.evaluator.invocation_count(), 0);
    assert!(evaluated_events(&h.publisher).is_empty());
}

#[tokio::test]
async fn redelivered_resource_event_upserts_in_place() {
    let h = harness(0);

    h.aggregator
        .handle(
            "ResourceNormalized",
            "fac-1",
            "c1",
            &resource_event(Some("pat-1"), observation("obs-1", 1)),
        )
        .await
        .expect("handle");
    h.aggregator
        .handle(
            "ResourceNormalized",
            "fac-1",
            "c1",
            &resource_event(Some("pat-1"), observation("obs-1", 2)),
        )
        .await
        .expect("handle");

    let resources = h
        .resource_store
        .find_by_correlation("fac-1", "c1")
        .await
        .expect("find");
    assert_eq!(resources.len(), 1, "redundant delivery must not duplicate");
    assert_eq!(
        resources[0].payload["valueQuantity"]["value"],
        serde_json::json!(2),
        "second payload wins"
    );
    assert_eq!(h.correlation_store.record_count(), 1);
}

#[tokio::test]
async fn completion_event_assembles_bundle_and_evaluates_once_per_entry() {
    let h = harness(0);

    h.aggregator
        .handle(
            "ResourceNormalized",
            "fac-1",
            "c1",
            &resource_event(Some("pat-1"), observation("obs-1", 42)),
        )
        .await
        .expect("handle");
    h.aggregator
        .handle(
            "ResourceNormalized",
            "fac-1",
            "c1",
            &completion_event(Some("pat-1"), QueryPhase::Initial),
        )
        .await
        .expect("handle");

    let seen = h.evaluator.seen();
    assert_eq!(seen.len(), 1, "one evaluation per report entry");
    assert_eq!(seen[0].report_type, "hypo");
    assert_eq!(seen[0].patient_id.as_deref(), Some("pat-1"));
    assert_eq!(
        seen[0].bundle_total, 1,
        "bundle contains exactly the prior observation"
    );

    let received = h
        .telemetry
        .events()
        .into_iter()
        .filter(|event| {
            matches!(
                event,
                cohort::telemetry::TelemetryEvent::DeliveryReceived { .. }
            )
        })
        .count();
    assert_eq!(received, 2, "every consumed delivery is counted");
}

#[tokio::test]
async fn completion_event_never_upserts_a_resource() {
    let h = harness(0);

    h.aggregator
        .handle(
            "ResourceNormalized",
            "fac-1",
            "c1",
            &resource_event(Some("pat-1"), observation("obs-1", 42)),
        )
        .await
        .expect("handle");

    // Even a completion event that happens to carry a payload does not
    // accumulate it.
    let mut completion = completion_event(Some("pat-1"), QueryPhase::Initial);
    completion.resource = Some(observation("obs-2", 7));
    h.aggregator
        .handle("ResourceNormalized", "fac-1", "c1", &completion)
        .await
        .expect("handle");

    assert_eq!(h.resource_store.resource_count(), 1);
}

#[tokio::test]
async fn non_terminal_events_never_trigger_evaluation() {
    let h = harness(1);

    for index in 0..5 {
        h.aggregator
            .handle(
                "ResourceNormalized",
                "fac-1",
                "c1",
                &resource_event(Some("pat-1"), observation(&format!("obs-{index}"), index)),
            )
            .await
            .expect("handle");
    }

    assert_eq!(h.evaluator.invocation_count(), 0);
    assert!(evaluated_events(&h.publisher).is_empty());
    assert!(second_wave_events(&h.publisher).is_empty());
}

#[tokio::test]
async fn patient_id_is_backfilled_exactly_once() {
    let h = harness(0);

    h.aggregator
        .handle(
            "ResourceNormalized",
            "fac-1",
            "c1",
            &resource_event(None, observation("obs-1", 1)),
        )
        .await
        .expect("handle");
    let record = h
        .correlation_store
        .find("fac-1", "c1")
        .await
        .expect("find")
        .expect("record");
    assert!(record.patient_id.is_none());

    h.aggregator
        .handle(
            "ResourceNormalized",
            "fac-1",
            "c1",
            &resource_event(Some("pat-1"), observation("obs-2", 2)),
        )
        .await
        .expect("handle");
    h.aggregator
        .handle(
            "ResourceNormalized",
            "fac-1",
            "c1",
            &resource_event(Some("pat-other"), observation("obs-3", 3)),
        )
        .await
        .expect("handle");

    let record = h
        .correlation_store
        .find("fac-1", "c1")
        .await
        .expect("find")
        .expect("record");
    assert_eq!(
        record.patient_id.as_deref(),
        Some("pat-1"),
        "first resolved patient id sticks"
    );
}
