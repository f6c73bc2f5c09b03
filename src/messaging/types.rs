use tokio::sync::oneshot;

/// Logical topic names, mirrored end-to-end with the upstream services.
/// The `-Error` and `-Retry` variants carry the same payload shape as their
/// base topic.
pub mod topics {
    pub const RESOURCE_NORMALIZED: &str = "ResourceNormalized";
    pub const RESOURCE_NORMALIZED_ERROR: &str = "ResourceNormalized-Error";
    pub const RESOURCE_NORMALIZED_RETRY: &str = "ResourceNormalized-Retry";
    pub const RESOURCE_ACQUIRED_ERROR: &str = "ResourceAcquired-Error";
    pub const EVALUATION_REQUESTED: &str = "EvaluationRequested";
    pub const RESOURCE_EVALUATED: &str = "ResourceEvaluated";
    pub const DATA_ACQUISITION_REQUESTED: &str = "DataAcquisitionRequested";

    pub const ERROR_SUFFIX: &str = "-Error";

    /// The topics whose payload is the resource-delivery shape.
    pub const RESOURCE_DELIVERY_TOPICS: [&str; 4] = [
        RESOURCE_NORMALIZED,
        RESOURCE_NORMALIZED_ERROR,
        RESOURCE_NORMALIZED_RETRY,
        RESOURCE_ACQUIRED_ERROR,
    ];
}

pub mod headers {
    pub const CORRELATION_ID: &str = "X-Correlation-Id";
    pub const ERROR_KIND: &str = "X-Error-Kind";
    pub const ERROR_MESSAGE: &str = "X-Error-Message";
}

/// Manual-acknowledgment token. Acking consumes the token; the broker side
/// of the oneshot observes completion and commits the offset. Dropping the
/// token unacked only happens if the worker task itself dies.
#[derive(Debug)]
pub struct AckToken {
    tx: oneshot::Sender<()>,
}

impl AckToken {
    pub fn channel() -> (AckToken, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (AckToken { tx }, rx)
    }

    pub fn ack(self) {
        let _ = self.tx.send(());
    }
}

/// Per-message context handed to handlers alongside the typed payload.
#[derive(Debug, Clone)]
pub struct DeliveryContext {
    pub topic: String,
    pub key: String,
    pub correlation_id: Option<String>,
}

/// One message scheduled onto an execution lane.
#[derive(Debug)]
pub struct Delivery<T> {
    pub context: DeliveryContext,
    pub value: T,
    pub ack: AckToken,
}

/// One message bound for a downstream topic. Keys are JSON values because
/// some produced topics key on a structured measurement-window identity
/// rather than a plain facility id.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub topic: String,
    pub key: serde_json::Value,
    pub value: serde_json::Value,
    pub headers: Vec<(String, String)>,
}

impl OutboundMessage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header == name)
            .map(|(_, value)| value.as_str())
    }
}
