//! Assistive vision pipeline
//!
//! Turns a live camera feed into on-screen annotations and short spoken
//! descriptions of nearby objects for low-vision users.
//!
//! # Architecture
//!
//! Each frame flows one way through the pipeline:
//!
//! ```text
//! Frame -> normalize -> InferenceBackend -> decode -> (overlay, debouncer) -> speech
//! ```
//!
//! # Module Structure
//!
//! - `frame`: camera frames with release-once ownership
//! - `ingest`: frame normalization and local frame sources
//! - `detect`: inference boundary, raw batches, detection decoding
//! - `announce`: debouncing of spoken labels
//! - `overlay`, `speech`: hand-off to presentation and audio contexts
//! - `pipeline`: per-frame coordinator
//! - `config`, `labels`: session setup

pub mod announce;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod labels;
pub mod overlay;
pub mod pipeline;
pub mod speech;

pub use announce::{AnnouncementDebouncer, AnnouncementState, DebouncePolicy, SPEAK_DELAY};
pub use detect::{
    decode, BackendRegistry, BoundingBox, BoxLayout, DecoderConfig, Detection, DetectionDecoder,
    DetectionSet, InferenceBackend, InputSpec, RawDetectionBatch, ScriptedBackend, Size,
    UnknownLabelPolicy,
};
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use error::PipelineError;
pub use frame::{Frame, PixelFormat};
pub use ingest::{normalize, FileConfig, FileSource, NormalizedTensor, TensorData, TensorType};
pub use labels::load_labels;
pub use overlay::{OverlaySlot, PresentationSink};
pub use pipeline::{FrameOutcome, PipelineCoordinator, PipelineSettings, PipelineStats};
pub use speech::{compose_utterance, SpeechSink, Utterance};
