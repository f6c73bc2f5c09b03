use uuid::Uuid;

use crate::{
    error::PipelineError,
    evaluation::{
        outcome::{EvaluationOutcome, MEASURE_REPORT_TYPE},
        ports::{EvaluationRequest, MeasureEvaluator},
    },
    model::ClinicalResource,
};

/// Evaluator adapter for running without an engine collaborator: produces
/// an empty-population measure report, so nothing is ever reportable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvaluator;

impl MeasureEvaluator for NoopEvaluator {
    fn evaluate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<EvaluationOutcome, PipelineError> {
        let measure_report_id = Uuid::now_v7().to_string();
        Ok(EvaluationOutcome {
            measure_report_id: measure_report_id.clone(),
            populations: Vec::new(),
            resources: vec![ClinicalResource {
                resource_type: MEASURE_REPORT_TYPE.to_string(),
                resource_id: measure_report_id.clone(),
                payload: serde_json::json!({
                    "resourceType": MEASURE_REPORT_TYPE,
                    "id": measure_report_id,
                    "measure": request.report_type,
                }),
            }],
        })
    }
}
