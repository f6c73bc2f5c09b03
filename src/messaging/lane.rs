use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::{
    error::{PipelineError, transport_error},
    messaging::{
        recovery::{FailedDelivery, RecoveryPolicy},
        types::{Delivery, DeliveryContext},
    },
};

/// Message handler invoked on the lane's worker task. Must be idempotent:
/// the broker redelivers on any failure mode past the ack.
#[async_trait]
pub trait DeliveryHandler<T>: Send + Sync {
    async fn handle(&self, context: &DeliveryContext, value: &T) -> Result<(), PipelineError>;
}

/// Strictly-ordered execution lane for one topic subscription. A single
/// worker task drains a bounded queue, so deliveries are handled in arrival
/// order and a dispatching broker thread never blocks beyond queue
/// backpressure. After the handler returns or fails the delivery is acked
/// unconditionally; failures are first handed to the recovery policy.
pub struct TopicLane<T> {
    topic: String,
    tx: Mutex<Option<mpsc::Sender<Delivery<T>>>>,
    worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<T> TopicLane<T>
where
    T: Serialize + Send + 'static,
{
    pub fn spawn(
        topic: impl Into<String>,
        capacity: usize,
        handler: Arc<dyn DeliveryHandler<T>>,
        recovery: Arc<dyn RecoveryPolicy>,
    ) -> Self {
        let topic = topic.into();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker_topic = topic.clone();
        let worker =
            tokio::spawn(async move { run_worker(worker_topic, rx, handler, recovery).await });
        Self {
            topic,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Enqueues a delivery onto the lane. Rejects once shutdown has closed
    /// the gate, so the broker can leave the message uncommitted for the
    /// next consumer instance.
    pub async fn dispatch(&self, delivery: Delivery<T>) -> Result<(), PipelineError> {
        let tx = {
            let guard = self.tx.lock().expect("lock poisoned");
            guard.clone()
        };
        let Some(tx) = tx else {
            return Err(transport_error(format!(
                "lane for topic '{}' is shut down",
                self.topic
            )));
        };
        tx.send(delivery)
            .await
            .map_err(|_| transport_error(format!("lane worker for topic '{}' is gone", self.topic)))
    }

    /// Stops accepting new deliveries, drains everything already queued,
    /// and joins the worker. Idempotent.
    pub async fn shutdown(&self) {
        let tx = self.tx.lock().expect("lock poisoned").take();
        drop(tx);
        let worker = self.worker.lock().expect("lock poisoned").take();
        if let Some(worker) = worker
            && let Err(join_error) = worker.await
        {
            tracing::warn!(topic = %self.topic, error = %join_error, "lane_worker_join_failed");
        }
    }
}

async fn run_worker<T>(
    topic: String,
    mut rx: mpsc::Receiver<Delivery<T>>,
    handler: Arc<dyn DeliveryHandler<T>>,
    recovery: Arc<dyn RecoveryPolicy>,
) where
    T: Serialize + Send + 'static,
{
    while let Some(delivery) = rx.recv().await {
        let Delivery {
            context,
            value,
            ack,
        } = delivery;

        // One span per message carries the correlation context and drops
        // with it, so nothing leaks into the next delivery on this lane.
        let span = tracing::info_span!(
            "consume",
            topic = %context.topic,
            key = %context.key,
            correlation_id = context.correlation_id.as_deref().unwrap_or(""),
        );
        let result = handler.handle(&context, &value).instrument(span).await;

        if let Err(error) = result {
            tracing::error!(
                topic = %context.topic,
                key = %context.key,
                correlation_id = context.correlation_id.as_deref().unwrap_or(""),
                error = %error,
                "delivery_failed"
            );
            let failed = FailedDelivery {
                topic: context.topic.clone(),
                key: context.key.clone(),
                correlation_id: context.correlation_id.clone(),
                payload: serde_json::to_value(&value).unwrap_or(serde_json::Value::Null),
            };
            recovery.recover(&failed, &error).await;
        }

        ack.ack();
    }
    tracing::debug!(topic = %topic, "lane_worker_drained");
}
