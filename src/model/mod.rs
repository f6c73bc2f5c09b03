pub mod aggregation;
pub mod events;

pub use aggregation::{AccumulatedResource, AggregationRecord, ReportEntry, ResourceBundle};
pub use events::{
    ClinicalResource, DataAcquisitionRequested, InboundEvent, QueryPhase, ReevaluationRequested,
    ResourceDelivery, ResourceEvaluated, ResourceEvaluatedKey, ScheduledReport, TriggeringEvent,
};
