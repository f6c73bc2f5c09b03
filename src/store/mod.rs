pub mod cache;
pub mod clock;
pub mod memory;
pub mod ports;

pub use cache::AggregationCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::{InMemoryCorrelationStore, InMemoryResourceStore};
pub use ports::{CorrelationStore, ResourceStore};
