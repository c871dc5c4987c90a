//! Per-frame orchestration: normalize → infer → decode → debounce.
//!
//! The coordinator is driven from one frame-ready context at a time. Frames
//! are consumed by value and released before `process_frame` returns, on
//! success and on failure alike. A failing frame is logged and produces an
//! empty outcome; the session carries on with the next one.

use std::collections::BTreeSet;
use std::time::Instant;

use crate::announce::{AnnouncementDebouncer, DebouncePolicy};
use crate::detect::{DecoderConfig, DetectionDecoder, DetectionSet, InferenceBackend, Size};
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::ingest::normalize::normalize;
use crate::overlay::PresentationSink;
use crate::speech::{compose_utterance, SpeechSink};

/// Session-wide pipeline settings.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PipelineSettings {
    pub decoder: DecoderConfig,
    pub debounce: DebouncePolicy,
    /// Surface detections are drawn on. May be empty until laid out.
    pub display: Size,
}

/// Result of one pipeline pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameOutcome {
    pub detections: DetectionSet,
    pub announcements: BTreeSet<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_processed: u64,
    pub frames_failed: u64,
    pub announcements: u64,
    pub last_error: Option<&'static str>,
}

pub struct PipelineCoordinator {
    backend: Box<dyn InferenceBackend>,
    decoder: DetectionDecoder,
    debouncer: AnnouncementDebouncer,
    display: Size,
    presentation: Option<Box<dyn PresentationSink>>,
    speech: Option<Box<dyn SpeechSink>>,
    stats: PipelineStats,
}

impl PipelineCoordinator {
    pub fn new(
        settings: PipelineSettings,
        labels: Vec<String>,
        backend: Box<dyn InferenceBackend>,
    ) -> Self {
        let input = backend.input_spec();
        log::info!(
            "pipeline: backend={} input={}x{} {:?} labels={} policy={:?}",
            backend.name(),
            input.width,
            input.height,
            input.tensor_type,
            labels.len(),
            settings.debounce
        );
        Self {
            backend,
            decoder: DetectionDecoder::new(labels, settings.decoder),
            debouncer: AnnouncementDebouncer::new(settings.debounce),
            display: settings.display,
            presentation: None,
            speech: None,
            stats: PipelineStats::default(),
        }
    }

    pub fn with_presentation_sink<S: PresentationSink + 'static>(mut self, sink: S) -> Self {
        self.presentation = Some(Box::new(sink));
        self
    }

    pub fn with_speech_sink<S: SpeechSink + 'static>(mut self, sink: S) -> Self {
        self.speech = Some(Box::new(sink));
        self
    }

    pub fn warm_up(&mut self) -> anyhow::Result<()> {
        self.backend.warm_up()
    }

    /// Update the destination surface (e.g. after a layout change).
    pub fn set_display_size(&mut self, display: Size) {
        self.display = display;
    }

    /// Start a new session: announcement history is forgotten.
    pub fn restart(&mut self) {
        self.debouncer.reset_history();
        log::info!("pipeline: announcement history reset");
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn debouncer(&self) -> &AnnouncementDebouncer {
        &self.debouncer
    }

    /// Run one frame through the pipeline and hand the results to the sinks.
    pub fn process_frame(&mut self, frame: Frame) -> FrameOutcome {
        let result = self.run(&frame, frame.captured_at());
        // Return the frame to its source before any sink work.
        drop(frame);

        self.stats.frames_processed += 1;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("frame dropped ({}): {}", e.code(), e);
                self.stats.frames_failed += 1;
                self.stats.last_error = Some(e.code());
                FrameOutcome::default()
            }
        };

        self.dispatch(&outcome);
        outcome
    }

    fn run(&mut self, frame: &Frame, now: Instant) -> Result<FrameOutcome, PipelineError> {
        let input = self.backend.input_spec();
        let tensor = normalize(frame, input.width, input.height, input.tensor_type)?;
        let batch = self
            .backend
            .infer(&tensor)
            .map_err(|e| PipelineError::InferenceFailure(format!("{:#}", e)))?;
        log::debug!(
            "inference: {} of {} slots filled",
            batch.count,
            batch.capacity()
        );
        let detections = self.decoder.decode(&batch, input.size(), self.display)?;
        let announcements = self.debouncer.decide(&detections, now);
        Ok(FrameOutcome {
            detections,
            announcements,
        })
    }

    fn dispatch(&mut self, outcome: &FrameOutcome) {
        if let Some(sink) = self.presentation.as_mut() {
            sink.present(outcome.detections.clone());
        }
        if let Some(utterance) = compose_utterance(&outcome.announcements) {
            self.stats.announcements += 1;
            log::info!("announce: {}", utterance.text);
            if let Some(sink) = self.speech.as_mut() {
                sink.speak(utterance);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{RawDetectionBatch, ScriptedBackend};
    use crate::frame::PixelFormat;

    fn rgb_frame() -> Frame {
        Frame::new(vec![90u8; 8 * 8 * 3], 8, 8, PixelFormat::Rgb24)
    }

    fn one_dog() -> RawDetectionBatch {
        let mut batch = RawDetectionBatch::with_capacity(10);
        batch.boxes[0] = [0.0, 0.0, 0.5, 0.5];
        batch.scores[0] = 0.9;
        batch.classes[0] = 0;
        batch.count = 1;
        batch
    }

    fn coordinator(backend: ScriptedBackend) -> PipelineCoordinator {
        let settings = PipelineSettings {
            display: Size::new(640, 480),
            ..PipelineSettings::default()
        };
        PipelineCoordinator::new(settings, vec!["dog".to_string()], Box::new(backend))
    }

    #[test]
    fn announces_new_labels_once() {
        let mut pipeline = coordinator(ScriptedBackend::default().repeating(one_dog()));

        let first = pipeline.process_frame(rgb_frame());
        assert_eq!(first.detections.len(), 1);
        assert_eq!(first.announcements.len(), 1);

        let second = pipeline.process_frame(rgb_frame());
        assert_eq!(second.detections.len(), 1);
        assert!(second.announcements.is_empty());
        assert_eq!(pipeline.stats().announcements, 1);
    }

    #[test]
    fn restart_allows_reannouncement() {
        let mut pipeline = coordinator(ScriptedBackend::default().repeating(one_dog()));
        pipeline.process_frame(rgb_frame());
        pipeline.restart();
        assert_eq!(pipeline.process_frame(rgb_frame()).announcements.len(), 1);
    }

    #[test]
    fn failures_produce_empty_outcomes() {
        let mut backend = ScriptedBackend::default();
        backend.push_failure("delegate crashed");
        let mut pipeline = coordinator(backend);

        let outcome = pipeline.process_frame(rgb_frame());
        assert_eq!(outcome, FrameOutcome::default());
        assert_eq!(pipeline.stats().last_error, Some("inference_failure"));

        let gray = Frame::new(vec![0u8; 64], 8, 8, PixelFormat::Gray8);
        assert_eq!(pipeline.process_frame(gray), FrameOutcome::default());
        assert_eq!(pipeline.stats().last_error, Some("unsupported_format"));
        assert_eq!(pipeline.stats().frames_failed, 2);
        assert_eq!(pipeline.stats().frames_processed, 2);
    }
}
