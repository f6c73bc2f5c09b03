use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::PipelineError,
    messaging::{
        publisher::EventPublisher,
        types::{OutboundMessage, headers, topics},
    },
};

/// Everything a recovery policy gets to see about a failed message. The
/// payload is the raw value as delivered, so an error-topic consumer can
/// replay it.
#[derive(Debug, Clone)]
pub struct FailedDelivery {
    pub topic: String,
    pub key: String,
    pub correlation_id: Option<String>,
    pub payload: serde_json::Value,
}

/// Invoked by the execution lane after a handler fails. The outcome never
/// blocks acknowledgment; a policy that itself fails is logged and dropped.
#[async_trait]
pub trait RecoveryPolicy: Send + Sync {
    async fn recover(&self, failed: &FailedDelivery, error: &PipelineError);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecovery;

#[async_trait]
impl RecoveryPolicy for NoopRecovery {
    async fn recover(&self, _failed: &FailedDelivery, _error: &PipelineError) {}
}

/// Forwards the failed message plus its error context to `<topic>-Error`,
/// unconditionally on the source topic, matching the upstream dead-letter
/// convention.
pub struct ErrorTopicForwarder {
    publisher: Arc<dyn EventPublisher>,
}

impl ErrorTopicForwarder {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl RecoveryPolicy for ErrorTopicForwarder {
    async fn recover(&self, failed: &FailedDelivery, error: &PipelineError) {
        let error_topic = format!("{}{}", failed.topic, topics::ERROR_SUFFIX);
        let mut message_headers = vec![
            (headers::ERROR_KIND.to_string(), format!("{:?}", error.kind)),
            (headers::ERROR_MESSAGE.to_string(), error.message.clone()),
        ];
        if let Some(correlation_id) = &failed.correlation_id {
            message_headers.push((headers::CORRELATION_ID.to_string(), correlation_id.clone()));
        }

        tracing::error!(
            topic = %failed.topic,
            error_topic = %error_topic,
            key = %failed.key,
            error = %error,
            "forwarding_failed_delivery"
        );

        let forwarded = OutboundMessage {
            topic: error_topic,
            key: serde_json::Value::String(failed.key.clone()),
            value: failed.payload.clone(),
            headers: message_headers,
        };
        if let Err(publish_error) = self.publisher.publish(forwarded).await {
            tracing::warn!(
                topic = %failed.topic,
                error = %publish_error,
                "error_topic_forwarding_failed"
            );
        }
    }
}
