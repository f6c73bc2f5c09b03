use serde::{Deserialize, Serialize};

use crate::model::ClinicalResource;

pub const MEASURE_REPORT_TYPE: &str = "MeasureReport";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationCount {
    pub code: String,
    pub count: u64,
}

/// What comes back across the evaluation-engine boundary: the generated
/// measure report's identity, its population/group counts, and the
/// normalized resources the engine produced (the measure report itself
/// among them).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationOutcome {
    pub measure_report_id: String,
    pub populations: Vec<PopulationCount>,
    pub resources: Vec<ClinicalResource>,
}

impl EvaluationOutcome {
    /// The normalized measure report among the outcome resources, when the
    /// engine produced one.
    pub fn measure_report(&self) -> Option<&ClinicalResource> {
        self.resources
            .iter()
            .find(|resource| resource.resource_type == MEASURE_REPORT_TYPE)
    }

    pub fn population_summary(&self) -> String {
        self.populations
            .iter()
            .map(|population| format!("{}=[{}]", population.code, population.count))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
