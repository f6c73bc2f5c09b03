use std::{sync::Arc, time::Instant};

use crate::{
    error::{PipelineError, internal_error},
    evaluation::{
        ports::{EvaluationRequest, MeasureEvaluator, ReportabilityPolicy},
        producer::ResourceEvaluatedProducer,
    },
    messaging::{
        publisher::EventPublisher,
        types::{OutboundMessage, headers, topics},
    },
    model::{
        AggregationRecord, DataAcquisitionRequested, QueryPhase, ResourceBundle, ScheduledReport,
    },
    store::ports::CorrelationStore,
    telemetry::{TelemetryEvent, TelemetryPort},
};

/// Runs one evaluation per report entry against an assembled bundle and
/// applies the phase branching: INITIAL decides and persists reportability
/// and closes out non-reportable reports; SUPPLEMENTAL emits everything.
/// When an INITIAL pass leaves the patient reportable overall, a
/// second-wave acquisition request is produced.
pub struct EvaluationOrchestrator {
    evaluator: Arc<dyn MeasureEvaluator>,
    reportability: Arc<dyn ReportabilityPolicy>,
    correlation_store: Arc<dyn CorrelationStore>,
    producer: ResourceEvaluatedProducer,
    publisher: Arc<dyn EventPublisher>,
    telemetry: Arc<dyn TelemetryPort>,
}

impl EvaluationOrchestrator {
    pub fn new(
        evaluator: Arc<dyn MeasureEvaluator>,
        reportability: Arc<dyn ReportabilityPolicy>,
        correlation_store: Arc<dyn CorrelationStore>,
        publisher: Arc<dyn EventPublisher>,
        telemetry: Arc<dyn TelemetryPort>,
    ) -> Self {
        Self {
            evaluator,
            reportability,
            correlation_store,
            producer: ResourceEvaluatedProducer::new(publisher.clone()),
            publisher,
            telemetry,
        }
    }

    pub async fn evaluate_record(
        &self,
        phase: QueryPhase,
        scheduled_reports: &[ScheduledReport],
        record: &mut AggregationRecord,
        bundle: &ResourceBundle,
    ) -> Result<(), PipelineError> {
        tracing::debug!(
            correlation_id = %record.correlation_id,
            phase = phase.as_str(),
            reports = record.reports.len(),
            bundle_total = bundle.total(),
            "evaluating_measures"
        );

        for index in 0..record.reports.len() {
            let outcome = {
                let report = &record.reports[index];
                let request = EvaluationRequest {
                    report_type: &report.report_type,
                    period_start: report.period_start,
                    period_end: report.period_end,
                    patient_id: record.patient_id.as_deref(),
                    bundle,
                };
                let started = Instant::now();
                let outcome = self.evaluator.evaluate(&request).map_err(|error| {
                    tracing::error!(
                        report_type = %report.report_type,
                        patient_id = record.patient_id.as_deref().unwrap_or(""),
                        facility_id = %record.facility_id,
                        correlation_id = %record.correlation_id,
                        error = %error,
                        "measure_evaluation_failed"
                    );
                    error
                })?;
                let elapsed_ms = started.elapsed().as_millis();
                tracing::debug!(
                    report_type = %report.report_type,
                    populations = %outcome.population_summary(),
                    elapsed_ms,
                    "measure_evaluated"
                );
                self.telemetry.on_event(TelemetryEvent::EvaluationCompleted {
                    report_type: report.report_type.clone(),
                    elapsed_ms,
                });
                outcome
            };

            if phase == QueryPhase::Initial {
                let reportable = self.reportability.is_reportable(&outcome);
                record.reports[index].reportable = Some(reportable);
                self.correlation_store.save(record).await?;
            }

            let report = record.reports[index].clone();
            self.producer
                .produce_phase_gated(phase, record, &report, &outcome)
                .await?;
        }

        let reportable_patient = record.reportable_patient();
        self.telemetry.on_event(if reportable_patient {
            TelemetryEvent::PatientReportable {
                facility_id: record.facility_id.clone(),
                patient_id: record.patient_id.clone(),
                correlation_id: record.correlation_id.clone(),
            }
        } else {
            TelemetryEvent::PatientNotReportable {
                facility_id: record.facility_id.clone(),
                patient_id: record.patient_id.clone(),
                correlation_id: record.correlation_id.clone(),
            }
        });

        if phase == QueryPhase::Initial && reportable_patient {
            self.produce_data_acquisition_requested(record, scheduled_reports)
                .await?;
        }

        Ok(())
    }

    async fn produce_data_acquisition_requested(
        &self,
        record: &AggregationRecord,
        scheduled_reports: &[ScheduledReport],
    ) -> Result<(), PipelineError> {
        tracing::debug!(
            topic = topics::DATA_ACQUISITION_REQUESTED,
            correlation_id = %record.correlation_id,
            "producing_second_wave_request"
        );

        let value = DataAcquisitionRequested {
            patient_id: record.patient_id.clone(),
            query_phase: QueryPhase::Supplemental,
            triggering_event: record.triggering_event.clone(),
            scheduled_reports: scheduled_reports.to_vec(),
        };
        let message = OutboundMessage {
            topic: topics::DATA_ACQUISITION_REQUESTED.to_string(),
            key: serde_json::Value::String(record.facility_id.clone()),
            value: serde_json::to_value(&value)
                .map_err(|err| internal_error(format!("failed to serialize event: {err}")))?,
            headers: vec![(
                headers::CORRELATION_ID.to_string(),
                record.correlation_id.clone(),
            )],
        };
        self.publisher.publish(message).await
    }
}
