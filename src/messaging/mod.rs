pub mod bridge;
pub mod lane;
pub mod publisher;
pub mod recovery;
pub mod types;

pub use lane::{DeliveryHandler, TopicLane};
pub use publisher::{EventPublisher, InMemoryPublisher};
pub use recovery::{ErrorTopicForwarder, FailedDelivery, NoopRecovery, RecoveryPolicy};
pub use types::{AckToken, Delivery, DeliveryContext, OutboundMessage, headers, topics};
