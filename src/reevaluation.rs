use std::{sync::Arc, time::Instant};

use crate::{
    aggregator::bundler::ResourceBundler,
    error::{PipelineError, ambiguous_target},
    evaluation::{
        ports::{EvaluationRequest, MeasureEvaluator},
        producer::ResourceEvaluatedProducer,
    },
    messaging::publisher::EventPublisher,
    model::{AggregationRecord, ReevaluationRequested, TriggeringEvent},
    store::ports::{CorrelationStore, ResourceStore},
    telemetry::{TelemetryEvent, TelemetryPort},
};

/// Handles an external request to re-run evaluation against a previously
/// completed aggregation. Produces a fresh aggregation snapshot scoped to
/// one report: the matched entry is relabeled with the new tracking id, a
/// new record is inserted under the request's correlation id with the
/// prior resource set copied beneath it, and evaluation is re-run for
/// exactly that entry with unconditional emission.
pub struct ReevaluationHandler {
    correlation_store: Arc<dyn CorrelationStore>,
    resource_store: Arc<dyn ResourceStore>,
    evaluator: Arc<dyn MeasureEvaluator>,
    bundler: ResourceBundler,
    producer: ResourceEvaluatedProducer,
    telemetry: Arc<dyn TelemetryPort>,
}

impl ReevaluationHandler {
    pub fn new(
        correlation_store: Arc<dyn CorrelationStore>,
        resource_store: Arc<dyn ResourceStore>,
        evaluator: Arc<dyn MeasureEvaluator>,
        publisher: Arc<dyn EventPublisher>,
        telemetry: Arc<dyn TelemetryPort>,
    ) -> Self {
        Self {
            correlation_store,
            resource_store: resource_store.clone(),
            evaluator,
            bundler: ResourceBundler::new(resource_store),
            producer: ResourceEvaluatedProducer::new(publisher),
            telemetry,
        }
    }

    pub async fn handle(
        &self,
        topic: &str,
        facility_id: &str,
        new_correlation_id: &str,
        request: &ReevaluationRequested,
    ) -> Result<(), PipelineError> {
        self.telemetry.on_event(TelemetryEvent::DeliveryReceived {
            topic: topic.to_string(),
            correlation_id: Some(new_correlation_id.to_string()),
        });

        let Some(prior) = self
            .correlation_store
            .find_latest_by_tracking_id(facility_id, &request.patient_id, &request.previous_report_id)
            .await?
        else {
            // Legitimate absence of prior state, not an error: the upstream
            // system had no matching in-flight report.
            tracing::warn!(
                facility_id,
                patient_id = %request.patient_id,
                previous_report_id = %request.previous_report_id,
                "reevaluation_target_not_found"
            );
            return Ok(());
        };

        let matched: Vec<_> = prior
            .reports
            .iter()
            .filter(|report| report.report_tracking_id == request.previous_report_id)
            .cloned()
            .collect();
        if matched.len() > 1 {
            return Err(ambiguous_target(format!(
                "{} report entries match previous tracking id '{}'",
                matched.len(),
                request.previous_report_id
            )));
        }

        let mut relabeled = matched;
        for report in &mut relabeled {
            report.report_tracking_id = request.report_tracking_id.clone();
        }

        let snapshot = AggregationRecord {
            facility_id: prior.facility_id.clone(),
            correlation_id: new_correlation_id.to_string(),
            patient_id: prior.patient_id.clone(),
            triggering_event: TriggeringEvent::adhoc(),
            reports: relabeled,
        };

        // Copy the prior resource set under the new correlation id so the
        // snapshot stays self-contained regardless of what happens to the
        // prior cycle's data.
        let prior_resources = self
            .resource_store
            .find_by_correlation(facility_id, &prior.correlation_id)
            .await?;
        for resource in prior_resources {
            let mut copied = resource;
            copied.correlation_id = new_correlation_id.to_string();
            self.resource_store.upsert(copied).await?;
        }

        let snapshot = self.correlation_store.insert(snapshot).await?;
        let bundle = self
            .bundler
            .assemble(facility_id, &prior.correlation_id)
            .await?;

        for report in &snapshot.reports {
            let started = Instant::now();
            let outcome = self.evaluator.evaluate(&EvaluationRequest {
                report_type: &report.report_type,
                period_start: report.period_start,
                period_end: report.period_end,
                patient_id: snapshot.patient_id.as_deref(),
                bundle: &bundle,
            })?;
            self.telemetry.on_event(TelemetryEvent::EvaluationCompleted {
                report_type: report.report_type.clone(),
                elapsed_ms: started.elapsed().as_millis(),
            });
            // Explicitly requested re-run: no reportability gate.
            self.producer.produce_all(&snapshot, report, &outcome).await?;
        }

        let reportable_patient = prior.reportable_patient();
        self.telemetry.on_event(if reportable_patient {
            TelemetryEvent::PatientReportable {
                facility_id: prior.facility_id.clone(),
                patient_id: prior.patient_id.clone(),
                correlation_id: prior.correlation_id.clone(),
            }
        } else {
            TelemetryEvent::PatientNotReportable {
                facility_id: prior.facility_id.clone(),
                patient_id: prior.patient_id.clone(),
                correlation_id: prior.correlation_id.clone(),
            }
        });

        Ok(())
    }
}
