use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidEvent,
    AmbiguousTarget,
    UnexpectedPhase,
    Store,
    Transport,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineError {
    pub kind: PipelineErrorKind,
    pub message: String,
}

impl PipelineError {
    pub fn new(kind: PipelineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Errors that must not be retried: reprocessing the same message can
    /// never succeed, so redelivery only belongs to the other kinds.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            PipelineErrorKind::InvalidEvent
                | PipelineErrorKind::AmbiguousTarget
                | PipelineErrorKind::UnexpectedPhase
        )
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PipelineError {}

pub fn invalid_event(message: impl Into<String>) -> PipelineError {
    PipelineError::new(PipelineErrorKind::InvalidEvent, message)
}

pub fn ambiguous_target(message: impl Into<String>) -> PipelineError {
    PipelineError::new(PipelineErrorKind::AmbiguousTarget, message)
}

pub fn unexpected_phase(message: impl Into<String>) -> PipelineError {
    PipelineError::new(PipelineErrorKind::UnexpectedPhase, message)
}

pub fn store_error(message: impl Into<String>) -> PipelineError {
    PipelineError::new(PipelineErrorKind::Store, message)
}

pub fn transport_error(message: impl Into<String>) -> PipelineError {
    PipelineError::new(PipelineErrorKind::Transport, message)
}

pub fn internal_error(message: impl Into<String>) -> PipelineError {
    PipelineError::new(PipelineErrorKind::Internal, message)
}
