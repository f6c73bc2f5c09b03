use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::{
    aggregator::handler::ResourceAggregator,
    error::{PipelineError, invalid_event, transport_error, unexpected_phase},
    evaluation::{
        orchestrator::EvaluationOrchestrator,
        ports::{MeasureEvaluator, ReportabilityPolicy},
    },
    messaging::{
        lane::{DeliveryHandler, TopicLane},
        publisher::EventPublisher,
        recovery::{FailedDelivery, RecoveryPolicy},
        types::{AckToken, Delivery, DeliveryContext, topics},
    },
    model::{QueryPhase, ReevaluationRequested, ResourceDelivery},
    reevaluation::ReevaluationHandler,
    store::{
        cache::AggregationCache,
        ports::{CorrelationStore, ResourceStore},
    },
    telemetry::TelemetryPort,
};

/// Collaborators injected into the runtime. Everything the core touches
/// crosses one of these seams.
pub struct CoreDependencies {
    pub correlation_store: Arc<dyn CorrelationStore>,
    pub resource_store: Arc<dyn ResourceStore>,
    pub cache: Arc<AggregationCache>,
    pub evaluator: Arc<dyn MeasureEvaluator>,
    pub reportability: Arc<dyn ReportabilityPolicy>,
    pub publisher: Arc<dyn EventPublisher>,
    pub telemetry: Arc<dyn TelemetryPort>,
    pub recovery: Arc<dyn RecoveryPolicy>,
}

#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    pub lane_capacity: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self { lane_capacity: 32 }
    }
}

/// Owns one execution lane per consumed topic and resolves the inbound
/// event union exactly once, by topic, before anything enters a lane.
/// Dispatchers get an ack receiver back; the ack fires after the handler
/// has returned or failed (and recovery ran), never earlier.
pub struct CoreRuntime {
    resource_lanes: Vec<TopicLane<ResourceDelivery>>,
    reevaluation_lane: TopicLane<ReevaluationRequested>,
    recovery: Arc<dyn RecoveryPolicy>,
}

impl CoreRuntime {
    pub fn start(options: RuntimeOptions, deps: CoreDependencies) -> Self {
        let orchestrator = Arc::new(EvaluationOrchestrator::new(
            deps.evaluator.clone(),
            deps.reportability.clone(),
            deps.correlation_store.clone(),
            deps.publisher.clone(),
            deps.telemetry.clone(),
        ));
        let aggregator = Arc::new(ResourceAggregator::new(
            deps.correlation_store.clone(),
            deps.resource_store.clone(),
            deps.cache.clone(),
            orchestrator,
            deps.telemetry.clone(),
        ));
        let reevaluation = Arc::new(ReevaluationHandler::new(
            deps.correlation_store.clone(),
            deps.resource_store.clone(),
            deps.evaluator.clone(),
            deps.publisher.clone(),
            deps.telemetry.clone(),
        ));

        let resource_handler: Arc<dyn DeliveryHandler<ResourceDelivery>> =
            Arc::new(ResourceDeliveryRoute { aggregator });
        let resource_lanes = topics::RESOURCE_DELIVERY_TOPICS
            .iter()
            .map(|topic| {
                TopicLane::spawn(
                    *topic,
                    options.lane_capacity,
                    resource_handler.clone(),
                    deps.recovery.clone(),
                )
            })
            .collect();

        let reevaluation_handler: Arc<dyn DeliveryHandler<ReevaluationRequested>> =
            Arc::new(ReevaluationRoute {
                handler: reevaluation,
            });
        let reevaluation_lane = TopicLane::spawn(
            topics::EVALUATION_REQUESTED,
            options.lane_capacity,
            reevaluation_handler,
            deps.recovery.clone(),
        );

        Self {
            resource_lanes,
            reevaluation_lane,
            recovery: deps.recovery,
        }
    }

    /// Entry point for broker bridges: raw JSON value plus the delivery
    /// metadata. Payload-shape failures never enter a lane; they run the
    /// recovery policy here and come back pre-acked, mirroring a failed
    /// handler.
    pub async fn dispatch_raw(
        &self,
        topic: &str,
        key: String,
        correlation_id: Option<String>,
        value: serde_json::Value,
    ) -> Result<oneshot::Receiver<()>, PipelineError> {
        if let Some(lane) = self
            .resource_lanes
            .iter()
            .find(|lane| lane.topic() == topic)
        {
            return match serde_json::from_value::<ResourceDelivery>(value.clone()) {
                Ok(event) => self.enqueue(lane, topic, key, correlation_id, event).await,
                Err(err) => {
                    let error = classify_delivery_error(&value, &err);
                    self.recover_boundary_failure(topic, key, correlation_id, value, error)
                        .await
                }
            };
        }

        if topic == topics::EVALUATION_REQUESTED {
            return match serde_json::from_value::<ReevaluationRequested>(value.clone()) {
                Ok(event) => {
                    self.enqueue(&self.reevaluation_lane, topic, key, correlation_id, event)
                        .await
                }
                Err(err) => {
                    let error = invalid_event(format!("malformed re-evaluation request: {err}"));
                    self.recover_boundary_failure(topic, key, correlation_id, value, error)
                        .await
                }
            };
        }

        Err(transport_error(format!("no lane subscribes to topic '{topic}'")))
    }

    /// Stops accepting new deliveries on every lane and drains in-flight
    /// work to completion.
    pub async fn shutdown(&self) {
        for lane in &self.resource_lanes {
            lane.shutdown().await;
        }
        self.reevaluation_lane.shutdown().await;
    }

    async fn enqueue<T>(
        &self,
        lane: &TopicLane<T>,
        topic: &str,
        key: String,
        correlation_id: Option<String>,
        value: T,
    ) -> Result<oneshot::Receiver<()>, PipelineError>
    where
        T: serde::Serialize + Send + 'static,
    {
        let (ack, ack_rx) = AckToken::channel();
        lane.dispatch(Delivery {
            context: DeliveryContext {
                topic: topic.to_string(),
                key,
                correlation_id,
            },
            value,
            ack,
        })
        .await?;
        Ok(ack_rx)
    }

    async fn recover_boundary_failure(
        &self,
        topic: &str,
        key: String,
        correlation_id: Option<String>,
        value: serde_json::Value,
        error: PipelineError,
    ) -> Result<oneshot::Receiver<()>, PipelineError> {
        tracing::error!(topic, key = %key, error = %error, "boundary_deserialization_failed");
        let failed = FailedDelivery {
            topic: topic.to_string(),
            key,
            correlation_id,
            payload: value,
        };
        self.recovery.recover(&failed, &error).await;
        let (ack, ack_rx) = AckToken::channel();
        ack.ack();
        Ok(ack_rx)
    }
}

/// An unknown query-phase classifier is its own fatal condition; every
/// other shape failure is a plain validation error.
fn classify_delivery_error(value: &serde_json::Value, err: &serde_json::Error) -> PipelineError {
    if let Some(phase) = value.get("queryPhase").and_then(|phase| phase.as_str())
        && serde_json::from_value::<QueryPhase>(serde_json::Value::String(phase.to_string()))
            .is_err()
    {
        return unexpected_phase(format!("unknown query phase '{phase}'"));
    }
    invalid_event(format!("malformed resource delivery: {err}"))
}

struct ResourceDeliveryRoute {
    aggregator: Arc<ResourceAggregator>,
}

#[async_trait]
impl DeliveryHandler<ResourceDelivery> for ResourceDeliveryRoute {
    async fn handle(
        &self,
        context: &DeliveryContext,
        value: &ResourceDelivery,
    ) -> Result<(), PipelineError> {
        let correlation_id = context
            .correlation_id
            .as_deref()
            .ok_or_else(|| invalid_event("correlation id header is missing"))?;
        self.aggregator
            .handle(&context.topic, &context.key, correlation_id, value)
            .await
    }
}

struct ReevaluationRoute {
    handler: Arc<ReevaluationHandler>,
}

#[async_trait]
impl DeliveryHandler<ReevaluationRequested> for ReevaluationRoute {
    async fn handle(
        &self,
        context: &DeliveryContext,
        value: &ReevaluationRequested,
    ) -> Result<(), PipelineError> {
        // The request's correlation header becomes the correlation id of
        // the new aggregation snapshot.
        let new_correlation_id = context
            .correlation_id
            .as_deref()
            .ok_or_else(|| invalid_event("correlation id header is missing"))?;
        self.handler
            .handle(&context.topic, &context.key, new_correlation_id, value)
            .await
    }
}
