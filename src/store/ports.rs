use async_trait::async_trait;

use crate::{
    error::PipelineError,
    model::{AccumulatedResource, AggregationRecord},
};

/// Access contract for the durable per-patient aggregation state. No method
/// takes a lock anywhere: concurrent handlers for the same correlation id
/// are reconciled by the insert-if-absent and conditional-update semantics
/// below, which every backing engine must honor.
#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Insert-if-absent keyed by (facility, correlation id). On a creation
    /// race the stored record wins; the canonical record is returned either
    /// way so callers always continue with what the store holds.
    async fn insert(&self, record: AggregationRecord)
    -> Result<AggregationRecord, PipelineError>;

    /// Back-fills the patient id, conditional on the record existing with
    /// patient id still unset. First writer wins; the canonical record
    /// after the attempt is returned.
    async fn backfill_patient_id(
        &self,
        facility_id: &str,
        correlation_id: &str,
        patient_id: &str,
    ) -> Result<AggregationRecord, PipelineError>;

    /// Whole-record save, used to persist reportability flags evaluated in
    /// place. Re-running a save with the same flags is a no-op.
    async fn save(&self, record: &AggregationRecord) -> Result<(), PipelineError>;

    async fn find(
        &self,
        facility_id: &str,
        correlation_id: &str,
    ) -> Result<Option<AggregationRecord>, PipelineError>;

    /// Most recent record for the facility/patient holding a report entry
    /// with the given tracking id. Used by ad-hoc re-evaluation.
    async fn find_latest_by_tracking_id(
        &self,
        facility_id: &str,
        patient_id: &str,
        report_tracking_id: &str,
    ) -> Result<Option<AggregationRecord>, PipelineError>;
}

/// Access contract for individually accumulated clinical resources.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Upsert keyed by the full (facility, correlation, resource type,
    /// resource id) tuple; the payload is last-write-wins so redundant
    /// delivery is idempotent.
    async fn upsert(&self, resource: AccumulatedResource) -> Result<(), PipelineError>;

    /// Every accumulated resource for the correlation id, in the store's
    /// retrieval order.
    async fn find_by_correlation(
        &self,
        facility_id: &str,
        correlation_id: &str,
    ) -> Result<Vec<AccumulatedResource>, PipelineError>;
}
