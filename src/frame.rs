//! Camera frame ownership.
//!
//! A `Frame` is handed to the pipeline by value and never retained past one
//! pipeline pass. Upstream sources are usually bounded pools that stall when
//! frames are not returned, so a frame may carry a release hook that runs
//! exactly once, when the frame is dropped.
//!
//! `Frame` deliberately does not implement `Clone`; a second owner (and with it
//! a second release) cannot be created:
//!
//! ```compile_fail
//! use assistive_vision::{Frame, PixelFormat};
//!
//! let frame = Frame::new(vec![0u8; 3], 1, 1, PixelFormat::Rgb24);
//! let _copy = frame.clone();
//! ```

use std::fmt;
use std::time::Instant;

/// Pixel layout of a frame as delivered by the camera.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 8-bit RGB.
    Rgb24,
    /// Packed 8-bit RGBA. Alpha is discarded.
    Rgba32,
    /// Y plane followed by interleaved U/V at quarter resolution.
    Nv12,
    /// Y plane followed by interleaved V/U at quarter resolution.
    Nv21,
    /// Y, U and V planes, chroma at quarter resolution.
    I420,
    /// Single luma plane.
    Gray8,
    /// Compressed JPEG bitstream.
    Jpeg,
}

impl PixelFormat {
    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Rgba32 => "rgba32",
            PixelFormat::Nv12 => "nv12",
            PixelFormat::Nv21 => "nv21",
            PixelFormat::I420 => "i420",
            PixelFormat::Gray8 => "gray8",
            PixelFormat::Jpeg => "jpeg",
        }
    }
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// One camera frame.
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    captured_at: Instant,
    release: Option<ReleaseHook>,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
            captured_at: Instant::now(),
            release: None,
        }
    }

    /// Attach the hook that returns this frame to its source.
    pub fn with_release<F>(mut self, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.release = Some(Box::new(release));
        self
    }

    /// Override the capture instant (sources with their own clock, tests).
    pub fn with_capture_instant(mut self, captured_at: Instant) -> Self {
        self.captured_at = captured_at;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn release_hook_runs_once_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let frame = Frame::new(vec![0u8; 12], 2, 2, PixelFormat::Rgb24).with_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(released.load(Ordering::SeqCst), 0);
        drop(frame);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn frame_without_hook_drops_quietly() {
        let frame = Frame::new(vec![1, 2, 3], 1, 1, PixelFormat::Rgb24);
        assert_eq!(frame.byte_len(), 3);
        assert_eq!(frame.data(), &[1, 2, 3]);
        assert_eq!((frame.width(), frame.height()), (1, 1));
        assert_eq!(frame.format(), PixelFormat::Rgb24);
    }

    #[test]
    fn debug_output_omits_pixels() {
        let frame = Frame::new(vec![9u8; 6], 1, 1, PixelFormat::Nv12);
        let text = format!("{:?}", frame);
        assert!(text.contains("bytes: 6"));
        assert!(!text.contains("[9"));
    }
}
