use std::sync::Arc;

use crate::{
    error::{PipelineError, internal_error},
    evaluation::outcome::EvaluationOutcome,
    messaging::{
        publisher::EventPublisher,
        types::{OutboundMessage, headers, topics},
    },
    model::{
        AggregationRecord, ClinicalResource, QueryPhase, ReportEntry, ResourceEvaluated,
        ResourceEvaluatedKey,
    },
};

/// Emits "evaluated resource" events, keyed by facility plus the
/// measurement-window identity, one normalized clinical resource per
/// message.
pub struct ResourceEvaluatedProducer {
    publisher: Arc<dyn EventPublisher>,
}

impl ResourceEvaluatedProducer {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    /// Phase-gated emission for the main aggregation flow. INITIAL closes
    /// out non-reportable reports by emitting only the normalized measure
    /// report; reportable reports emit nothing and wait for the
    /// supplemental pass. SUPPLEMENTAL emits every normalized resource
    /// unconditionally.
    pub async fn produce_phase_gated(
        &self,
        phase: QueryPhase,
        record: &AggregationRecord,
        report: &ReportEntry,
        outcome: &EvaluationOutcome,
    ) -> Result<(), PipelineError> {
        match phase {
            QueryPhase::Initial => {
                if report.reportable == Some(false)
                    && let Some(measure_report) = outcome.measure_report()
                {
                    self.produce_one(record, report, &outcome.measure_report_id, measure_report)
                        .await?;
                }
                Ok(())
            }
            QueryPhase::Supplemental => self.produce_all(record, report, outcome).await,
        }
    }

    /// Unconditional emission, used by ad-hoc re-evaluation where the run
    /// itself was explicitly requested.
    pub async fn produce_all(
        &self,
        record: &AggregationRecord,
        report: &ReportEntry,
        outcome: &EvaluationOutcome,
    ) -> Result<(), PipelineError> {
        for resource in &outcome.resources {
            self.produce_one(record, report, &outcome.measure_report_id, resource)
                .await?;
        }
        Ok(())
    }

    async fn produce_one(
        &self,
        record: &AggregationRecord,
        report: &ReportEntry,
        measure_report_id: &str,
        resource: &ClinicalResource,
    ) -> Result<(), PipelineError> {
        tracing::trace!(
            topic = topics::RESOURCE_EVALUATED,
            resource = %format!("{}/{}", resource.resource_type, resource.resource_id),
            "producing_evaluated_resource"
        );

        let key = ResourceEvaluatedKey {
            facility_id: record.facility_id.clone(),
            period_start: report.period_start,
            period_end: report.period_end,
            frequency: report.frequency.clone(),
        };
        let value = ResourceEvaluated {
            measure_report_id: measure_report_id.to_string(),
            patient_id: record.patient_id.clone(),
            is_reportable: report.reportable,
            report_type: report.report_type.clone(),
            report_tracking_id: report.report_tracking_id.clone(),
            resource: resource.clone(),
        };

        let message = OutboundMessage {
            topic: topics::RESOURCE_EVALUATED.to_string(),
            key: serde_json::to_value(&key)
                .map_err(|err| internal_error(format!("failed to serialize event key: {err}")))?,
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
