use time::OffsetDateTime;

use crate::{error::PipelineError, evaluation::outcome::EvaluationOutcome, model::ResourceBundle};

/// One evaluation run: a measurement window, the patient under evaluation,
/// and the assembled bundle of everything accumulated for them.
#[derive(Debug, Clone)]
pub struct EvaluationRequest<'a> {
    pub report_type: &'a str,
    pub period_start: OffsetDateTime,
    pub period_end: OffsetDateTime,
    pub patient_id: Option<&'a str>,
    pub bundle: &'a ResourceBundle,
}

/// The external measure/CQL evaluation engine, consumed as a pure function.
/// Compilation, caching and FHIR semantics all live behind this seam.
pub trait MeasureEvaluator: Send + Sync {
    fn evaluate(&self, request: &EvaluationRequest<'_>)
    -> Result<EvaluationOutcome, PipelineError>;
}

/// Decides whether an evaluation outcome makes the report reportable.
pub trait ReportabilityPolicy: Send + Sync {
    fn is_reportable(&self, outcome: &EvaluationOutcome) -> bool;
}

/// Default policy: reportable when any population reached the configured
/// minimum count.
#[derive(Debug, Clone, Copy)]
pub struct MinimumPopulationReportability {
    pub minimum: u64,
}

impl Default for MinimumPopulationReportability {
    fn default() -> Self {
        Self { minimum: 1 }
    }
}

impl ReportabilityPolicy for MinimumPopulationReportability {
    fn is_reportable(&self, outcome: &EvaluationOutcome) -> bool {
        outcome
            .populations
            .iter()
            .any(|population| population.count >= self.minimum)
    }
}
