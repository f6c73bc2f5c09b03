use std::sync::Arc;

use cohort::{
    model::QueryPhase,
    store::{CorrelationStore, ResourceStore},
};

use crate::support::{
    completion_event, harness, harness_sharing, observation, resource_event,
};

#[tokio::test]
async fn concurrent_first_events_yield_exactly_one_record() {
    let base = harness(0);
    let correlation_store = base.correlation_store.clone();
    let resource_store = base.resource_store.clone();

    // Each task runs its own consumer instance (own dedup cache) against
    // the shared stores, like partitions spread over processes.
    let mut tasks = Vec::new();
    for index in 0..8 {
        let instance = harness_sharing(0, correlation_store.clone(), resource_store.clone());
        tasks.push(tokio::spawn(async move {
            instance
                .aggregator
                .handle(
                    "ResourceNormalized",
                    "fac-1",
                    "c-race",
                    &resource_event(
                        Some("pat-1"),
                        observation(&format!("obs-{index}"), index),
                    ),
                )
                .await
        }));
    }
    for task in tasks {
        task.await.expect("join").expect("handle");
    }

    assert_eq!(
        correlation_store.record_count(),
        1,
        "insert-if-absent must collapse the creation race"
    );
    let resources = resource_store
        .find_by_correlation("fac-1", "c-race")
        .await
        .expect("find");
    assert_eq!(resources.len(), 8, "every event's resource is accumulated");
}

#[tokio::test]
async fn resource_event_racing_completion_keeps_state_consistent() {
    let base = harness(0);
    let correlation_store = base.correlation_store.clone();
    let resource_store = base.resource_store.clone();

    let resource_instance =
        harness_sharing(0, correlation_store.clone(), resource_store.clone());
    let completion_instance =
        harness_sharing(0, correlation_store.clone(), resource_store.clone());
    let completion_evaluator = completion_instance.evaluator.clone();

    let resource_task = tokio::spawn(async move {
        resource_instance
            .aggregator
            .handle(
                "ResourceNormalized",
                "fac-1",
                "c-race",
                &resource_event(Some("pat-1"), observation("obs-late", 9)),
            )
            .await
    });
    let completion_task = tokio::spawn(async move {
        completion_instance
            .aggregator
            .handle(
                "ResourceNormalized",
                "fac-1",
                "c-race",
                &completion_event(Some("pat-1"), QueryPhase::Initial),
            )
            .await
    });

    resource_task.await.expect("join").expect("handle");
    completion_task.await.expect("join").expect("handle");

    // Whichever interleaving happened, the idempotent operations leave one
    // record, the late resource persisted, and one evaluation per entry.
    assert_eq!(correlation_store.record_count(), 1);
    let resources = resource_store
        .find_by_correlation("fac-1", "c-race")
        .await
        .expect("find");
    assert_eq!(resources.len(), 1);
    assert_eq!(completion_evaluator.invocation_count(), 1);

    let record = correlation_store
        .find("fac-1", "c-race")
        .await
        .expect("find")
        .expect("record");
    assert_eq!(record.patient_id.as_deref(), Some("pat-1"));
}

#[tokio::test]
async fn cache_lets_second_handler_observe_created_record() {
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

    let cached = h.cache.get("c1").expect("record must be cached after resolution");
    assert_eq!(cached.facility_id, "fac-1");
    assert_eq!(cached.patient_id.as_deref(), Some("pat-1"));

    // A second instance with a cold cache still resolves through the store.
    let second = harness_sharing(
        0,
        Arc::clone(&h.correlation_store),
        Arc::clone(&h.resource_store),
    );
    second
        .aggregator
        .handle(
            "ResourceNormalized",
            "fac-1",
            "c1",
            &resource_event(Some("pat-1"), observation("obs-2", 2)),
        )
        .await
        .expect("handle");
    assert_eq!(h.correlation_store.record_count(), 1);
}
