use std::{sync::Arc, time::Duration};

use cohort::{
    evaluation::{MinimumPopulationReportability, testing::ScriptedEvaluator},
    messaging::{ErrorTopicForwarder, InMemoryPublisher},
    runtime::{CoreDependencies, CoreRuntime, RuntimeOptions},
    store::{AggregationCache, InMemoryCorrelationStore, InMemoryResourceStore, ManualClock},
    telemetry::RecordingTelemetry,
};

pub struct Harness {
    pub correlation_store: Arc<InMemoryCorrelationStore>,
    pub resource_store: Arc<InMemoryResourceStore>,
    pub publisher: Arc<InMemoryPublisher>,
    pub evaluator: Arc<ScriptedEvaluator>,
    pub runtime: Arc<CoreRuntime>,
}

/// Full runtime over in-memory collaborators, recovery wired to the
/// error-topic forwarder.
pub fn runtime_harness(population_count: u64) -> Harness {
    let correlation_store = Arc::new(InMemoryCorrelationStore::new());
    let resource_store = Arc::new(InMemoryResourceStore::new());
    let publisher = Arc::new(InMemoryPublisher::new());
    let evaluator = Arc::new(ScriptedEvaluator::with_population_count(population_count));
    let runtime = Arc::new(CoreRuntime::start(
        RuntimeOptions { lane_capacity: 8 },
        CoreDependencies {
            correlation_store: correlation_store.clone(),
            resource_store: resource_store.clone(),
            cache: Arc::new(AggregationCache::new(
                Arc::new(ManualClock::new()),
                Duration::from_millis(60_000),
                64,
            )),
            evaluator: evaluator.clone(),
            reportability: Arc::new(MinimumPopulationReportability::default()),
            publisher: publisher.clone(),
            telemetry: Arc::new(RecordingTelemetry::new()),
            recovery: Arc::new(ErrorTopicForwarder::new(publisher.clone())),
        },
    ));
    Harness {
        correlation_store,
        resource_store,
        publisher,
        evaluator,
        runtime,
    }
}

pub fn resource_delivery_json(resource_id: &str, acquisition_complete: bool) -> serde_json::Value {
    let resource = if acquisition_complete {
        serde_json::Value::Null
    } else {
        serde_json::json!({
            "resourceType": "Observation",
            "resourceId": resource_id,
            "payload": { "resourceType": "Observation", "id": resource_id },
        })
    };
    serde_json::json!({
        "patientId": "pat-1",
        "queryPhase": "INITIAL",
        "resource": resource,
        "acquisitionComplete": acquisition_complete,
        "scheduledReports": [{
            "reportTypes": ["hypo"],
            "periodStart": "2026-01-01T00:00:00Z",
            "periodEnd": "2026-01-31T23:59:00Z",
            "frequency": "monthly",
            "reportTrackingId": "track-1",
        }],
        "triggeringEvent": "ADMISSION",
    })
}
