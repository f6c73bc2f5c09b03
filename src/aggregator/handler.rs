use std::sync::Arc;

use crate::{
    error::{PipelineError, invalid_event},
    evaluation::orchestrator::EvaluationOrchestrator,
    model::{AccumulatedResource, AggregationRecord, QueryPhase, ResourceDelivery, TriggeringEvent},
    store::{cache::AggregationCache, ports::{CorrelationStore, ResourceStore}},
    telemetry::{TelemetryEvent, TelemetryPort},
};

use super::bundler::ResourceBundler;

/// Consumes one resource-delivery event: validates it, resolves or creates
/// the aggregation record, and accumulates the resource; on an
/// acquisition-complete event it instead assembles the bundle and hands off
/// to evaluation. Every step is idempotent (insert-if-absent, conditional
/// update, last-write-wins upsert) so broker redelivery is always safe; no
/// lock is taken anywhere on the shared correlation state.
pub struct ResourceAggregator {
    correlation_store: Arc<dyn CorrelationStore>,
    resource_store: Arc<dyn ResourceStore>,
    cache: Arc<AggregationCache>,
    bundler: ResourceBundler,
    orchestrator: Arc<EvaluationOrchestrator>,
    telemetry: Arc<dyn TelemetryPort>,
}

impl ResourceAggregator {
    pub fn new(
        correlation_store: Arc<dyn CorrelationStore>,
        resource_store: Arc<dyn ResourceStore>,
        cache: Arc<AggregationCache>,
        orchestrator: Arc<EvaluationOrchestrator>,
        telemetry: Arc<dyn TelemetryPort>,
    ) -> Self {
        Self {
            correlation_store,
            resource_store: resource_store.clone(),
            cache,
            bundler: ResourceBundler::new(resource_store),
            orchestrator,
            telemetry,
        }
    }

    pub async fn handle(
        &self,
        topic: &str,
        facility_id: &str,
        correlation_id: &str,
        event: &ResourceDelivery,
    ) -> Result<(), PipelineError> {
        self.telemetry.on_event(TelemetryEvent::DeliveryReceived {
            topic: topic.to_string(),
            correlation_id: Some(correlation_id.to_string()),
        });

        let (phase, triggering_event) = validate(facility_id, event)?;

        let mut record = self
            .resolve_record(facility_id, correlation_id, event, triggering_event)
            .await?;

        if record.patient_id.is_none()
            && let Some(patient_id) = &event.patient_id
        {
            tracing::debug!(patient_id = %patient_id, "backfilling_patient_id");
            record = self
                .correlation_store
                .backfill_patient_id(facility_id, correlation_id, patient_id)
                .await?;
            self.cache.put(record.clone());
        }

        if event.acquisition_complete {
            tracing::info!(
                facility_id,
                correlation_id,
                phase = phase.as_str(),
                "acquisition_complete"
            );
            let bundle = self.bundler.assemble(facility_id, correlation_id).await?;
            return self
                .orchestrator
                .evaluate_record(phase, &event.scheduled_reports, &mut record, &bundle)
                .await;
        }

        // Presence of the resource was checked up front for non-terminal
        // events.
        let resource = event
            .resource
            .as_ref()
            .ok_or_else(|| invalid_event("resource payload is missing"))?;
        tracing::info!(
            facility_id,
            correlation_id,
            resource = %format!("{}/{}", resource.resource_type, resource.resource_id),
            "accumulating_resource"
        );
        self.resource_store
            .upsert(AccumulatedResource {
                facility_id: facility_id.to_string(),
                correlation_id: correlation_id.to_string(),
                patient_id: event.patient_id.clone(),
                resource_type: resource.resource_type.clone(),
                resource_id: resource.resource_id.clone(),
                payload: resource.payload.clone(),
            })
            .await
    }

    /// Dedup cache first, then the store, then synthesize-and-insert. The
    /// insert is insert-if-absent, so a concurrent creator elsewhere wins
    /// cleanly and we continue with the canonical record.
    async fn resolve_record(
        &self,
        facility_id: &str,
        correlation_id: &str,
        event: &ResourceDelivery,
        triggering_event: &TriggeringEvent,
    ) -> Result<AggregationRecord, PipelineError> {
        if let Some(cached) = self.cache.get(correlation_id) {
            return Ok(cached);
        }

        let record = match self.correlation_store.find(facility_id, correlation_id).await? {
            Some(existing) => existing,
            None => {
                tracing::debug!(facility_id, correlation_id, "creating_aggregation_record");
                self.correlation_store
                    .insert(AggregationRecord::new(
                        facility_id,
                        correlation_id,
                        event.patient_id.clone(),
                        triggering_event.clone(),
                        &event.scheduled_reports,
                    ))
                    .await?
            }
        };
        self.cache.put(record.clone());
        Ok(record)
    }
}

fn validate<'a>(
    facility_id: &str,
    event: &'a ResourceDelivery,
) -> Result<(QueryPhase, &'a TriggeringEvent), PipelineError> {
    if facility_id.is_empty() {
        return Err(invalid_event("facility id is missing or empty"));
    }
    if event.resource.is_none() && !event.acquisition_complete {
        return Err(invalid_event(
            "resource payload is missing and acquisition is not complete",
        ));
    }
    let phase = event
        .query_phase
        .ok_or_else(|| invalid_event("query phase is missing"))?;
    if event.scheduled_reports.is_empty() {
        return Err(invalid_event("scheduled reports are missing or empty"));
    }
    let triggering_event = event
        .triggering_event
        .as_ref()
        .ok_or_else(|| invalid_event("triggering event is missing"))?;
    Ok((phase, triggering_event))
}
