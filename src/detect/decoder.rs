//! Raw model output → validated, display-space detections.

use serde::Deserialize;

use crate::detect::result::{BoundingBox, Detection, DetectionSet, RawDetectionBatch, Size};
use crate::error::PipelineError;

pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

/// Treatment of slots whose class resolves to a label named "unknown".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownLabelPolicy {
    #[default]
    Exclude,
    Keep,
}

/// Coordinate order of each raw box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum BoxLayout {
    /// `(top, left, bottom, right)`, the SSD / EfficientDet convention.
    #[default]
    #[serde(rename = "tlbr")]
    TopLeftBottomRight,
    /// `(left, top, right, bottom)`.
    #[serde(rename = "ltrb")]
    LeftTopRightBottom,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecoderConfig {
    /// Slots must score strictly above this value.
    pub score_threshold: f32,
    pub unknown_labels: UnknownLabelPolicy,
    pub box_layout: BoxLayout,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            unknown_labels: UnknownLabelPolicy::default(),
            box_layout: BoxLayout::default(),
        }
    }
}

/// Decoder bound to a label table and configuration for one session.
#[derive(Clone, Debug)]
pub struct DetectionDecoder {
    labels: Vec<String>,
    config: DecoderConfig,
}

impl DetectionDecoder {
    pub fn new(labels: Vec<String>, config: DecoderConfig) -> Self {
        Self { labels, config }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn decode(
        &self,
        batch: &RawDetectionBatch,
        source: Size,
        dest: Size,
    ) -> Result<DetectionSet, PipelineError> {
        decode(batch, &self.labels, &self.config, source, dest)
    }
}

/// Decode the first `batch.count` slots of `batch`.
///
/// Boxes are mapped into `dest`; if `dest` has no area yet they are mapped
/// into `source` (the model input size) instead. Malformed slots are dropped
/// silently. Fails only when the batch arrays disagree on shape.
pub fn decode(
    batch: &RawDetectionBatch,
    labels: &[String],
    config: &DecoderConfig,
    source: Size,
    dest: Size,
) -> Result<DetectionSet, PipelineError> {
    check_shape(batch)?;

    let surface = if dest.is_empty() { source } else { dest };
    let width = surface.width as f32;
    let height = surface.height as f32;

    let mut detections = Vec::new();
    for slot in 0..batch.count {
        let score = batch.scores[slot];
        // NaN fails this comparison as well.
        if !(score > config.score_threshold) {
            continue;
        }

        let class = batch.classes[slot];
        let Some(label) = usize::try_from(class).ok().and_then(|i| labels.get(i)) else {
            log::trace!("slot {}: class index {} out of range", slot, class);
            continue;
        };
        if config.unknown_labels == UnknownLabelPolicy::Exclude && is_unknown(label) {
            continue;
        }

        let raw = batch.boxes[slot];
        if raw.iter().any(|v| v.is_nan()) {
            log::trace!("slot {}: box has NaN coordinates", slot);
            continue;
        }
        let [a, b, c, d] = raw.map(|v| v.clamp(0.0, 1.0));
        let (top, left, bottom, right) = match config.box_layout {
            BoxLayout::TopLeftBottomRight => (a, b, c, d),
            BoxLayout::LeftTopRightBottom => (b, a, d, c),
        };

        let bounding_box = BoundingBox {
            left: left * width,
            top: top * height,
            right: right * width,
            bottom: bottom * height,
        };
        log::trace!(
            "slot {}: {} score={:.2} box={:?}",
            slot,
            label,
            score,
            bounding_box
        );
        detections.push(Detection {
            label: label.clone(),
            score,
            bounding_box,
        });
    }

    Ok(DetectionSet::new(detections))
}

fn check_shape(batch: &RawDetectionBatch) -> Result<(), PipelineError> {
    let capacity = batch.scores.len();
    if batch.boxes.len() != capacity || batch.classes.len() != capacity {
        return Err(PipelineError::ShapeMismatch(format!(
            "boxes={} classes={} scores={}",
            batch.boxes.len(),
            batch.classes.len(),
            capacity
        )));
    }
    if batch.count > capacity {
        return Err(PipelineError::ShapeMismatch(format!(
            "count {} exceeds capacity {}",
            batch.count, capacity
        )));
    }
    Ok(())
}

fn is_unknown(label: &str) -> bool {
    label.trim().eq_ignore_ascii_case("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::class_index;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn batch(entries: &[([f32; 4], i64, f32)], capacity: usize) -> RawDetectionBatch {
        let mut batch = RawDetectionBatch::with_capacity(capacity);
        for (i, (bbox, class, score)) in entries.iter().enumerate() {
            batch.boxes[i] = *bbox;
            batch.classes[i] = *class;
            batch.scores[i] = *score;
        }
        batch.count = entries.len();
        batch
    }

    const DEST: Size = Size::new(400, 300);
    const SOURCE: Size = Size::new(320, 320);

    #[test]
    fn zero_count_ignores_stale_slots() -> anyhow::Result<()> {
        let mut raw = batch(&[([0.1, 0.1, 0.5, 0.5], 0, 0.99)], 4);
        raw.count = 0;
        let set = decode(&raw, &labels(&["dog"]), &DecoderConfig::default(), SOURCE, DEST)?;
        assert!(set.is_empty());
        Ok(())
    }

    #[test]
    fn only_count_slots_are_read() -> anyhow::Result<()> {
        let mut raw = batch(
            &[([0.0, 0.0, 1.0, 1.0], 0, 0.9), ([0.0, 0.0, 1.0, 1.0], 1, 0.9)],
            10,
        );
        raw.count = 1;
        let set = decode(&raw, &labels(&["dog", "cat"]), &DecoderConfig::default(), SOURCE, DEST)?;
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].label, "dog");
        Ok(())
    }

    #[test]
    fn threshold_is_strict() -> anyhow::Result<()> {
        let raw = batch(
            &[([0.0, 0.0, 1.0, 1.0], 0, 0.5), ([0.0, 0.0, 1.0, 1.0], 0, 0.5001)],
            4,
        );
        let set = decode(&raw, &labels(&["dog"]), &DecoderConfig::default(), SOURCE, DEST)?;
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].score, 0.5001);
        Ok(())
    }

    #[test]
    fn out_of_range_classes_are_dropped() -> anyhow::Result<()> {
        let table = labels(&["dog", "cat"]);
        let raw = batch(
            &[
                ([0.0, 0.0, 1.0, 1.0], 2, 0.9),
                ([0.0, 0.0, 1.0, 1.0], -1, 0.9),
                ([0.0, 0.0, 1.0, 1.0], i64::MAX, 0.9),
                ([0.0, 0.0, 1.0, 1.0], 1, 0.9),
            ],
            4,
        );
        let set = decode(&raw, &table, &DecoderConfig::default(), SOURCE, DEST)?;
        assert_eq!(set.labels().into_iter().collect::<Vec<_>>(), vec!["cat"]);
        Ok(())
    }

    #[test]
    fn nan_class_output_does_not_resolve_to_first_label() -> anyhow::Result<()> {
        let table = labels(&["person", "dog"]);
        let raw = batch(
            &[
                ([0.0, 0.0, 1.0, 1.0], class_index(f32::NAN), 0.9),
                ([0.0, 0.0, 1.0, 1.0], class_index(1.0), 0.9),
            ],
            2,
        );
        let set = decode(&raw, &table, &DecoderConfig::default(), SOURCE, DEST)?;
        assert_eq!(set.labels().into_iter().collect::<Vec<_>>(), vec!["dog"]);
        Ok(())
    }

    #[test]
    fn malformed_scores_are_dropped() -> anyhow::Result<()> {
        let raw = batch(
            &[
                ([0.0, 0.0, 1.0, 1.0], 0, f32::NAN),
                ([0.0, 0.0, 1.0, 1.0], 0, -3.0),
                ([f32::NAN, 0.0, 1.0, 1.0], 0, 0.9),
            ],
            3,
        );
        let set = decode(&raw, &labels(&["dog"]), &DecoderConfig::default(), SOURCE, DEST)?;
        assert!(set.is_empty());
        Ok(())
    }

    #[test]
    fn maps_width_and_height_onto_the_right_axes() -> anyhow::Result<()> {
        let raw = batch(&[([0.1, 0.2, 0.6, 0.8], 0, 0.9)], 1);
        let set = decode(&raw, &labels(&["dog"]), &DecoderConfig::default(), SOURCE, DEST)?;
        let b = set.as_slice()[0].bounding_box;
        assert!((b.left - 80.0).abs() < 1e-3);
        assert!((b.top - 30.0).abs() < 1e-3);
        assert!((b.right - 320.0).abs() < 1e-3);
        assert!((b.bottom - 180.0).abs() < 1e-3);
        Ok(())
    }

    #[test]
    fn ltrb_layout_is_reordered() -> anyhow::Result<()> {
        let raw = batch(&[([0.2, 0.1, 0.8, 0.6], 0, 0.9)], 1);
        let config = DecoderConfig {
            box_layout: BoxLayout::LeftTopRightBottom,
            ..DecoderConfig::default()
        };
        let set = decode(&raw, &labels(&["dog"]), &config, SOURCE, DEST)?;
        let b = set.as_slice()[0].bounding_box;
        assert!((b.left - 80.0).abs() < 1e-3);
        assert!((b.top - 30.0).abs() < 1e-3);
        assert!((b.right - 320.0).abs() < 1e-3);
        assert!((b.bottom - 180.0).abs() < 1e-3);
        Ok(())
    }

    #[test]
    fn out_of_range_coordinates_are_clamped() -> anyhow::Result<()> {
        let raw = batch(&[([-0.5, -0.1, 1.7, f32::INFINITY], 0, 0.9)], 1);
        let set = decode(&raw, &labels(&["dog"]), &DecoderConfig::default(), SOURCE, DEST)?;
        let b = set.as_slice()[0].bounding_box;
        assert_eq!(b, BoundingBox { left: 0.0, top: 0.0, right: 400.0, bottom: 300.0 });
        Ok(())
    }

    #[test]
    fn empty_destination_falls_back_to_source() -> anyhow::Result<()> {
        let raw = batch(&[([0.0, 0.0, 0.5, 0.5], 0, 0.9)], 1);
        let set = decode(
            &raw,
            &labels(&["dog"]),
            &DecoderConfig::default(),
            SOURCE,
            Size::new(0, 0),
        )?;
        let b = set.as_slice()[0].bounding_box;
        assert_eq!((b.right, b.bottom), (160.0, 160.0));
        Ok(())
    }

    #[test]
    fn unknown_label_policy_is_configurable() -> anyhow::Result<()> {
        let table = labels(&["Unknown", "dog"]);
        let raw = batch(
            &[([0.0, 0.0, 1.0, 1.0], 0, 0.9), ([0.0, 0.0, 1.0, 1.0], 1, 0.9)],
            2,
        );

        let excluded = decode(&raw, &table, &DecoderConfig::default(), SOURCE, DEST)?;
        assert_eq!(excluded.len(), 1);

        let config = DecoderConfig {
            unknown_labels: UnknownLabelPolicy::Keep,
            ..DecoderConfig::default()
        };
        let kept = decode(&raw, &table, &config, SOURCE, DEST)?;
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.as_slice()[0].label, "Unknown");
        Ok(())
    }

    #[test]
    fn preserves_batch_order() -> anyhow::Result<()> {
        let table = labels(&["dog", "cat", "car"]);
        let raw = batch(
            &[
                ([0.0, 0.0, 1.0, 1.0], 2, 0.6),
                ([0.0, 0.0, 1.0, 1.0], 0, 0.95),
                ([0.0, 0.0, 1.0, 1.0], 1, 0.7),
            ],
            3,
        );
        let set = decode(&raw, &table, &DecoderConfig::default(), SOURCE, DEST)?;
        let order: Vec<&str> = set.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(order, vec!["car", "dog", "cat"]);
        Ok(())
    }

    #[test]
    fn inconsistent_arrays_are_a_shape_mismatch() {
        let mut raw = RawDetectionBatch::with_capacity(4);
        raw.classes.pop();
        let err = decode(&raw, &labels(&["dog"]), &DecoderConfig::default(), SOURCE, DEST)
            .unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch(_)));

        let mut raw = RawDetectionBatch::with_capacity(4);
        raw.count = 5;
        let err = decode(&raw, &labels(&["dog"]), &DecoderConfig::default(), SOURCE, DEST)
            .unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch(_)));
    }

    #[test]
    fn decoder_struct_uses_its_label_table() -> anyhow::Result<()> {
        let decoder = DetectionDecoder::new(labels(&["person"]), DecoderConfig::default());
        let raw = batch(&[([0.0, 0.0, 1.0, 1.0], 0, 0.8)], 1);
        let set = decoder.decode(&raw, SOURCE, DEST)?;
        assert_eq!(set.labels().len(), 1);
        assert_eq!(decoder.labels().len(), 1);
        Ok(())
    }
}
