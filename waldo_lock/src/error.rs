// THEORY:
// Two families of failure exist in the engine and they are kept apart on purpose.
//
// 1.  `CapabilityError` is what a detection/tracking backend reports. Every
//     variant is recoverable: the state machine never sees it, because the
//     capability boundary folds it into "no observation" for the frame.
// 2.  `PipelineError` is the plumbing around the engine: loading configuration
//     and recordings, and talking to the session task. These are the only
//     errors a caller has to handle.

use thiserror::Error;

/// Failure modes of a detection or tracking backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapabilityError {
    /// The model or backend could not run on this frame.
    #[error("inference unavailable: {0}")]
    InferenceUnavailable(String),

    /// The backend ran but found nothing to report.
    #[error("no person observed")]
    NoObservation,

    /// The input box was zero-area or outside the unit square.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("session closed")]
    SessionClosed,

    #[error("session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
