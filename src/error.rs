use thiserror::Error;

/// Per-frame pipeline failures.
///
/// Every variant is recoverable: the coordinator logs it, emits an empty
/// result for the frame and keeps the session alive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Frame pixel format cannot be converted to interleaved RGB.
    #[error("unsupported frame format: {0}")]
    UnsupportedFormat(String),

    /// Raw batch arrays are inconsistent with the declared model output shape.
    #[error("raw detection batch shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Opaque failure reported by the inference boundary.
    #[error("inference failed: {0}")]
    InferenceFailure(String),
}

impl PipelineError {
    /// Short stable code used in logs and stats.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::UnsupportedFormat(_) => "unsupported_format",
            PipelineError::ShapeMismatch(_) => "shape_mismatch",
            PipelineError::InferenceFailure(_) => "inference_failure",
        }
    }
}
