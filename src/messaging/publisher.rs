use std::sync::Mutex;

use async_trait::async_trait;

use crate::{error::PipelineError, messaging::types::OutboundMessage};

/// Outbound edge of the core. A broker-backed adapter implements this in
/// deployment; the in-memory adapter below records sends for tests and for
/// running detached from a broker.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, message: OutboundMessage) -> Result<(), PipelineError>;
}

#[derive(Default)]
pub struct InMemoryPublisher {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().expect("lock poisoned").clone()
    }

    pub fn sent_to(&self, topic: &str) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|message| message.topic == topic)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<(), PipelineError> {
        self.sent.lock().expect("lock poisoned").push(message);
        Ok(())
    }
}
