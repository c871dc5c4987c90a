use anyhow::Result;

use crate::detect::result::{RawDetectionBatch, Size};
use crate::ingest::normalize::{NormalizedTensor, TensorType};

/// Input shape and element type, fixed when the model is loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputSpec {
    pub width: u32,
    pub height: u32,
    pub tensor_type: TensorType,
}

impl InputSpec {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Inference boundary.
///
/// The model is opaque to the pipeline: a tensor goes in, a raw detection
/// batch comes out. Implementations may use threads internally but each call
/// must return within bounded time. Errors surface to the coordinator as
/// per-frame inference failures.
pub trait InferenceBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Shape negotiated at load time. Must not change during a session.
    fn input_spec(&self) -> InputSpec;

    /// Run the model on one normalized frame.
    fn infer(&mut self, tensor: &NormalizedTensor) -> Result<RawDetectionBatch>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
