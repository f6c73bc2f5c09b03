/// Counter/measurement events this core emits. Exporter backends (OTLP,
/// Prometheus, ...) are collaborators; wiring one in means implementing
/// `TelemetryPort` over it.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    DeliveryReceived {
        topic: String,
        correlation_id: Option<String>,
    },
    PatientReportable {
        facility_id: String,
        patient_id: Option<String>,
        correlation_id: String,
    },
    PatientNotReportable {
        facility_id: String,
        patient_id: Option<String>,
        correlation_id: String,
    },
    EvaluationCompleted {
        report_type: String,
        elapsed_ms: u128,
    },
}

pub trait TelemetryPort: Send + Sync {
    fn on_event(&self, event: TelemetryEvent);
}

#[derive(Default)]
pub struct NoopTelemetry;

impl TelemetryPort for NoopTelemetry {
    fn on_event(&self, _event: TelemetryEvent) {}
}

/// Records every event for assertions; the test-side implementation.
#[derive(Default)]
pub struct RecordingTelemetry {
    events: std::sync::Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }
}

impl TelemetryPort for RecordingTelemetry {
    fn on_event(&self, event: TelemetryEvent) {
        self.events.lock().expect("lock poisoned").push(event);
    }
}
