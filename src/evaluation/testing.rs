use std::sync::{Arc, Mutex};

use crate::{
    error::PipelineError,
    evaluation::{
        outcome::{EvaluationOutcome, MEASURE_REPORT_TYPE, PopulationCount},
        ports::{EvaluationRequest, MeasureEvaluator},
    },
    model::ClinicalResource,
};

/// What a scripted evaluator saw on one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SeenEvaluation {
    pub report_type: String,
    pub patient_id: Option<String>,
    pub bundle_total: usize,
}

pub type EvaluatorHook =
    Arc<dyn Fn(&EvaluationRequest<'_>) -> Result<EvaluationOutcome, PipelineError> + Send + Sync>;

/// Test evaluator: runs a hook per request and records every invocation.
pub struct ScriptedEvaluator {
    hook: EvaluatorHook,
    seen: Mutex<Vec<SeenEvaluation>>,
}

impl ScriptedEvaluator {
    pub fn new(hook: EvaluatorHook) -> Self {
        Self {
            hook,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Scripted outcome independent of the request: one populated (or
    /// empty) population group plus the normalized measure report.
    pub fn with_population_count(count: u64) -> Self {
        Self::new(Arc::new(move |request| {
            Ok(outcome_with_population(
                &format!("mr-{}", request.report_type),
                count,
            ))
        }))
    }

    pub fn seen(&self) -> Vec<SeenEvaluation> {
        self.seen.lock().expect("lock poisoned").clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.seen.lock().expect("lock poisoned").len()
    }
}

impl MeasureEvaluator for ScriptedEvaluator {
    fn evaluate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<EvaluationOutcome, PipelineError> {
        self.seen.lock().expect("lock poisoned").push(SeenEvaluation {
            report_type: request.report_type.to_string(),
            patient_id: request.patient_id.map(|p| p.to_string()),
            bundle_total: request.bundle.total(),
        });
        (self.hook)(request)
    }
}

/// Outcome with one "initial-population" group at the given count and the
/// normalized measure report as its single resource.
pub fn outcome_with_population(measure_report_id: &str, count: u64) -> EvaluationOutcome {
    EvaluationOutcome {
        measure_report_id: measure_report_id.to_string(),
        populations: vec![PopulationCount {
            code: "initial-population".to_string(),
            count,
        }],
        resources: vec![ClinicalResource {
            resource_type: MEASURE_REPORT_TYPE.to_string(),
            resource_id: measure_report_id.to_string(),
            payload: serde_json::json!({
                "resourceType": MEASURE_REPORT_TYPE,
                "id": measure_report_id,
            }),
        }],
    }
}
