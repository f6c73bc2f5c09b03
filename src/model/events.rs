use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Which pass of the two-phase acquisition workflow a delivery belongs to.
/// INITIAL decides reportability; SUPPLEMENTAL gathers additional data for
/// patients already known to be reportable. The classifier is resolved once
/// at the deserialization boundary; an unknown value fails deserialization
/// there and never reaches the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryPhase {
    Initial,
    Supplemental,
}

impl QueryPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryPhase::Initial => "INITIAL",
            QueryPhase::Supplemental => "SUPPLEMENTAL",
        }
    }
}

/// Classifier of the upstream occurrence that opened a reporting cycle
/// (admission, discharge, scheduled census, ...). Opaque to this core apart
/// from the ad-hoc marker stamped onto re-evaluation snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggeringEvent(pub String);

impl TriggeringEvent {
    pub const ADHOC: &'static str = "ADHOC";

    pub fn adhoc() -> Self {
        Self(Self::ADHOC.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One clinical resource as carried on the wire: identity plus an opaque
/// payload this core never interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalResource {
    pub resource_type: String,
    pub resource_id: String,
    pub payload: serde_json::Value,
}

/// One report the upstream scheduler expects for this patient. Exploded into
/// one `ReportEntry` per report type when an aggregation record is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledReport {
    pub report_types: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub period_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub period_end: OffsetDateTime,
    pub frequency: String,
    pub report_tracking_id: String,
}

/// Resource-delivery shape shared by the normal delivery topics and their
/// error/retry variants. Classifier fields stay optional on the wire so the
/// aggregator can fail them as distinct validation errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDelivery {
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub query_phase: Option<QueryPhase>,
    #[serde(default)]
    pub resource: Option<ClinicalResource>,
    #[serde(default)]
    pub acquisition_complete: bool,
    #[serde(default)]
    pub scheduled_reports: Vec<ScheduledReport>,
    #[serde(default)]
    pub triggering_event: Option<TriggeringEvent>,
}

/// External request to re-run evaluation against a previously completed
/// aggregation, scoped to one prior report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReevaluationRequested {
    pub patient_id: String,
    pub previous_report_id: String,
    pub report_tracking_id: String,
}

/// Union of inbound payload shapes. Resolved exactly once, by topic, at the
/// deserialization boundary; nothing downstream inspects raw payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    ResourceDelivery(ResourceDelivery),
    Reevaluation(ReevaluationRequested),
}

/// Key of a produced "evaluated resource" event: facility plus the identity
/// of the measurement window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEvaluatedKey {
    pub facility_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub period_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub period_end: OffsetDateTime,
    pub frequency: String,
}

/// Produced once per normalized clinical resource coming out of an
/// evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEvaluated {
    pub measure_report_id: String,
    pub patient_id: Option<String>,
    pub is_reportable: Option<bool>,
    pub report_type: String,
    pub report_tracking_id: String,
    pub resource: ClinicalResource,
}

/// Produced to drive the second acquisition wave for a reportable patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataAcquisitionRequested {
    pub patient_id: Option<String>,
    pub query_phase: QueryPhase,
    pub triggering_event: TriggeringEvent,
    pub scheduled_reports: Vec<ScheduledReport>,
}
