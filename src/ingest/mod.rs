//! Frame ingestion and normalization.
//!
//! - `normalize`: converts camera frames into the model's input tensor
//! - `file`: local still-image and synthetic (`stub://`) sources
//!
//! Sources hand frames out by value; whoever holds the frame last drops it,
//! which returns it to the source.

pub mod file;
pub mod normalize;

pub use file::{FileConfig, FileSource, FileStats};
pub use normalize::{normalize, normalize_to_rgb, NormalizedTensor, TensorData, TensorType};
