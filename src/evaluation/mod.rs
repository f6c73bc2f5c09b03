pub mod noop;
pub mod orchestrator;
pub mod outcome;
pub mod ports;
pub mod producer;
pub mod testing;

pub use noop::NoopEvaluator;
pub use orchestrator::EvaluationOrchestrator;
pub use outcome::{EvaluationOutcome, PopulationCount};
pub use ports::{EvaluationRequest, MeasureEvaluator, MinimumPopulationReportability, ReportabilityPolicy};
pub use producer::ResourceEvaluatedProducer;
