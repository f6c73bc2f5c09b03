use std::sync::Arc;

use crate::{
    error::PipelineError,
    model::{ClinicalResource, ResourceBundle},
    store::ports::ResourceStore,
};

/// Assembles the bundle handed to the evaluation engine: every accumulated
/// resource for a correlation id, in store retrieval order.
pub struct ResourceBundler {
    resource_store: Arc<dyn ResourceStore>,
}

impl ResourceBundler {
    pub fn new(resource_store: Arc<dyn ResourceStore>) -> Self {
        Self { resource_store }
    }

    pub async fn assemble(
        &self,
        facility_id: &str,
        correlation_id: &str,
    ) -> Result<ResourceBundle, PipelineError> {
        let accumulated = self
            .resource_store
            .find_by_correlation(facility_id, correlation_id)
            .await?;

        tracing::debug!(
            facility_id,
            correlation_id,
            total = accumulated.len(),
            "assembled_bundle"
        );

        Ok(ResourceBundle {
            entries: accumulated
                .into_iter()
                .map(|resource| ClinicalResource {
                    resource_type: resource.resource_type,
                    resource_id: resource.resource_id,
                    payload: resource.payload,
                })
                .collect(),
        })
    }
}
