use std::sync::Arc;

use time::macros::datetime;

use cohort::{
    evaluation::testing::ScriptedEvaluator,
    messaging::InMemoryPublisher,
    model::{
        AccumulatedResource, AggregationRecord, ReevaluationRequested, ReportEntry,
        TriggeringEvent,
    },
    reevaluation::ReevaluationHandler,
    store::{CorrelationStore, InMemoryCorrelationStore, InMemoryResourceStore, ResourceStore},
    telemetry::RecordingTelemetry,
};

pub struct Harness {
    pub correlation_store: Arc<InMemoryCorrelationStore>,
    pub resource_store: Arc<InMemoryResourceStore>,
    pub publisher: Arc<InMemoryPublisher>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub evaluator: Arc<ScriptedEvaluator>,
    pub handler: ReevaluationHandler,
}

pub fn harness() -> Harness {
    let correlation_store = Arc::new(InMemoryCorrelationStore::new());
    let resource_store = Arc::new(InMemoryResourceStore::new());
    let publisher = Arc::new(InMemoryPublisher::new());
    let telemetry = Arc::new(RecordingTelemetry::new());
    let evaluator = Arc::new(ScriptedEvaluator::with_population_count(1));
    let handler = ReevaluationHandler::new(
        correlation_store.clone(),
        resource_store.clone(),
        evaluator.clone(),
        publisher.clone(),
        telemetry.clone(),
    );
    Harness {
        correlation_store,
        resource_store,
        publisher,
        telemetry,
        evaluator,
        handler,
    }
}

pub fn entry(report_type: &str, tracking_id: &str, reportable: Option<bool>) -> ReportEntry {
    ReportEntry {
        report_type: report_type.to_string(),
        frequency: "monthly".to_string(),
        period_start: datetime!(2026-01-01 00:00 UTC),
        period_end: datetime!(2026-01-31 23:59 UTC),
        reportable,
        report_tracking_id: tracking_id.to_string(),
    }
}

/// Seeds a completed prior aggregation: the record plus one accumulated
/// observation under its correlation id.
pub async fn seed_prior(h: &Harness, correlation_id: &str, reports: Vec<ReportEntry>) {
    h.correlation_store
        .insert(AggregationRecord {
            facility_id: "fac-1".to_string(),
            correlation_id: correlation_id.to_string(),
            patient_id: Some("pat-1".to_string()),
            triggering_event: TriggeringEvent("ADMISSION".to_string()),
            reports,
        })
        .await
        .expect("insert prior record");
    h.resource_store
        .upsert(AccumulatedResource {
            facility_id: "fac-1".to_string(),
            correlation_id: correlation_id.to_string(),
            patient_id: Some("pat-1".to_string()),
            resource_type: "Observation".to_string(),
            resource_id: "obs-1".to_string(),
            payload: serde_json::json!({"resourceType": "Observation", "id": "obs-1"}),
        })
        .await
        .expect("seed resource");
}

pub fn request(previous: &str, new_tracking: &str) -> ReevaluationRequested {
    ReevaluationRequested {
        patient_id: "pat-1".to_string(),
        previous_report_id: previous.to_string(),
        report_tracking_id: new_tracking.to_string(),
    }
}
