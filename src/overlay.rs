//! Presentation hand-off for on-screen annotations.

use std::sync::{Arc, Mutex};

use crate::detect::DetectionSet;

/// Receiver of per-frame detections. Each call replaces what was shown before.
pub trait PresentationSink: Send {
    fn present(&mut self, detections: DetectionSet);
}

/// Latest-only mailbox between the pipeline and the UI context.
///
/// The pipeline writes through an `OverlaySink`; the UI reads with `take` or
/// `latest`. An unread result is overwritten by the next frame's.
#[derive(Clone, Debug, Default)]
pub struct OverlaySlot {
    inner: Arc<Mutex<Option<DetectionSet>>>,
}

impl OverlaySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> OverlaySink {
        OverlaySink {
            inner: self.inner.clone(),
        }
    }

    /// Take the newest unread set, if any.
    pub fn take(&self) -> Option<DetectionSet> {
        match self.inner.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Copy of the newest unread set, leaving it in place.
    pub fn latest(&self) -> Option<DetectionSet> {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Writer half of an `OverlaySlot`.
pub struct OverlaySink {
    inner: Arc<Mutex<Option<DetectionSet>>>,
}

impl PresentationSink for OverlaySink {
    fn present(&mut self, detections: DetectionSet) {
        match self.inner.lock() {
            Ok(mut guard) => *guard = Some(detections),
            Err(poisoned) => *poisoned.into_inner() = Some(detections),
        }
    }
}

/// Logs each overlay update at debug level.
#[derive(Debug, Default)]
pub struct LogPresentationSink;

impl PresentationSink for LogPresentationSink {
    fn present(&mut self, detections: DetectionSet) {
        for detection in &detections {
            let b = detection.bounding_box;
            log::debug!(
                "overlay: {} {:.2} [{:.0},{:.0} {:.0}x{:.0}]",
                detection.label,
                detection.score,
                b.left,
                b.top,
                b.width(),
                b.height()
            );
        }
    }
}
