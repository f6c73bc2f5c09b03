use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::model::events::{ClinicalResource, ScheduledReport, TriggeringEvent};

/// One report to evaluate independently within a patient's aggregation:
/// a (report type, measurement window, frequency) unit plus the tracking id
/// the upstream scheduler uses to follow it across systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub report_type: String,
    pub frequency: String,
    #[serde(with = "time::serde::rfc3339")]
    pub period_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub period_end: OffsetDateTime,
    /// None until the INITIAL pass has evaluated this entry.
    pub reportable: Option<bool>,
    pub report_tracking_id: String,
}

/// Durable per-patient aggregation state, one per (facility, correlation id).
/// Created on the first event of a reporting cycle and mutated in place as
/// the patient id is resolved and reportability flags land. Never deleted by
/// this subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationRecord {
    pub facility_id: String,
    pub correlation_id: String,
    pub patient_id: Option<String>,
    pub triggering_event: TriggeringEvent,
    pub reports: Vec<ReportEntry>,
}

impl AggregationRecord {
    /// Synthesizes the record for a new correlation id, exploding each
    /// scheduled report into one entry per report type.
    pub fn new(
        facility_id: impl Into<String>,
        correlation_id: impl Into<String>,
        patient_id: Option<String>,
        triggering_event: TriggeringEvent,
        scheduled_reports: &[ScheduledReport],
    ) -> Self {
        let reports = scheduled_reports
            .iter()
            .flat_map(|scheduled| {
                scheduled.report_types.iter().map(|report_type| ReportEntry {
                    report_type: report_type.clone(),
                    frequency: scheduled.frequency.clone(),
                    period_start: scheduled.period_start,
                    period_end: scheduled.period_end,
                    reportable: None,
                    report_tracking_id: scheduled.report_tracking_id.clone(),
                })
            })
            .collect();
        Self {
            facility_id: facility_id.into(),
            correlation_id: correlation_id.into(),
            patient_id,
            triggering_event,
            reports,
        }
    }

    /// Patient-level reportability: OR across entries that have been
    /// evaluated. Entries still pending count as not reportable.
    pub fn reportable_patient(&self) -> bool {
        self.reports
            .iter()
            .any(|report| report.reportable == Some(true))
    }
}

/// One accumulated clinical resource, keyed by the full
/// (facility, correlation, resource type, resource id) tuple so redundant
/// delivery upserts in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatedResource {
    pub facility_id: String,
    pub correlation_id: String,
    pub patient_id: Option<String>,
    pub resource_type: String,
    pub resource_id: String,
    pub payload: serde_json::Value,
}

/// The assembled set of all accumulated resources for a correlation id,
/// handed to the evaluation engine. Entry order is store retrieval order
/// and carries no significance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceBundle {
    pub entries: Vec<ClinicalResource>,
}

impl ResourceBundle {
    pub fn total(&self) -> usize {
        self.entries.len()
    }
}
