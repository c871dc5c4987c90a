mod backend;
mod backends;
mod decoder;
mod registry;
mod result;

pub use backend::{InferenceBackend, InputSpec};
pub use backends::stub::DEFAULT_CAPACITY;
pub use backends::ScriptedBackend;
#[cfg(feature = "backend-tract")]
pub use backends::{tract::OutputLayout, TractBackend};
pub use decoder::{
    decode, BoxLayout, DecoderConfig, DetectionDecoder, UnknownLabelPolicy,
    DEFAULT_SCORE_THRESHOLD,
};
pub use registry::BackendRegistry;
pub use result::{class_index, BoundingBox, Detection, DetectionSet, RawDetectionBatch, Size};
