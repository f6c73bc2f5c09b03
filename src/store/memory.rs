use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    error::{PipelineError, store_error},
    model::{AccumulatedResource, AggregationRecord},
    store::ports::{CorrelationStore, ResourceStore},
};

/// In-memory correlation store. The reference adapter for tests and for
/// running without an external document store; deployment engines are
/// swapped in behind the same contract.
#[derive(Default)]
pub struct InMemoryCorrelationStore {
    records: Mutex<Vec<AggregationRecord>>,
}

impl InMemoryCorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().expect("lock poisoned").len()
    }
}

#[async_trait]
impl CorrelationStore for InMemoryCorrelationStore {
    async fn insert(
        &self,
        record: AggregationRecord,
    ) -> Result<AggregationRecord, PipelineError> {
        let mut records = self.records.lock().expect("lock poisoned");
        if let Some(existing) = records.iter().find(|candidate| {
            candidate.facility_id == record.facility_id
                && candidate.correlation_id == record.correlation_id
        }) {
            return Ok(existing.clone());
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn backfill_patient_id(
        &self,
        facility_id: &str,
        correlation_id: &str,
        patient_id: &str,
    ) -> Result<AggregationRecord, PipelineError> {
        let mut records = self.records.lock().expect("lock poisoned");
        let record = records
            .iter_mut()
            .find(|candidate| {
                candidate.facility_id == facility_id && candidate.correlation_id == correlation_id
            })
            .ok_or_else(|| {
                store_error(format!(
                    "no aggregation record for facility '{facility_id}' correlation '{correlation_id}'"
                ))
            })?;
        if record.patient_id.is_none() {
            record.patient_id = Some(patient_id.to_string());
        }
        Ok(record.clone())
    }

    async fn save(&self, record: &AggregationRecord) -> Result<(), PipelineError> {
        let mut records = self.records.lock().expect("lock poisoned");
        match records.iter_mut().find(|candidate| {
            candidate.facility_id == record.facility_id
                && candidate.correlation_id == record.correlation_id
        }) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    async fn find(
        &self,
        facility_id: &str,
        correlation_id: &str,
    ) -> Result<Option<AggregationRecord>, PipelineError> {
        let records = self.records.lock().expect("lock poisoned");
        Ok(records
            .iter()
            .find(|candidate| {
                candidate.facility_id == facility_id && candidate.correlation_id == correlation_id
            })
            .cloned())
    }

    async fn find_latest_by_tracking_id(
        &self,
        facility_id: &str,
        patient_id: &str,
        report_tracking_id: &str,
    ) -> Result<Option<AggregationRecord>, PipelineError> {
        let records = self.records.lock().expect("lock poisoned");
        Ok(records
            .iter()
            .rev()
            .find(|candidate| {
                candidate.facility_id == facility_id
                    && candidate.patient_id.as_deref() == Some(patient_id)
                    && candidate
                        .reports
                        .iter()
                        .any(|report| report.report_tracking_id == report_tracking_id)
            })
            .cloned())
    }
}

/// In-memory resource store. Retrieval order is insertion order.
#[derive(Default)]
pub struct InMemoryResourceStore {
    resources: Mutex<Vec<AccumulatedResource>>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.lock().expect("lock poisoned").len()
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn upsert(&self, resource: AccumulatedResource) -> Result<(), PipelineError> {
        let mut resources = self.resources.lock().expect("lock poisoned");
        match resources.iter_mut().find(|candidate| {
            candidate.facility_id == resource.facility_id
                && candidate.correlation_id == resource.correlation_id
                && candidate.resource_type == resource.resource_type
                && candidate.resource_id == resource.resource_id
        }) {
            Some(existing) => *existing = resource,
            None => resources.push(resource),
        }
        Ok(())
    }

    async fn find_by_correlation(
        &self,
        facility_id: &str,
        correlation_id: &str,
    ) -> Result<Vec<AccumulatedResource>, PipelineError> {
        let resources = self.resources.lock().expect("lock poisoned");
        Ok(resources
            .iter()
            .filter(|candidate| {
                candidate.facility_id == facility_id && candidate.correlation_id == correlation_id
            })
            .cloned()
            .collect())
    }
}
