use std::collections::BTreeSet;

/// Width and height of a surface in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Raw output of one inference call.
///
/// Four parallel arrays of equal capacity. Only the first `count` slots are
/// defined; the rest may hold stale values from an earlier frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawDetectionBatch {
    /// Normalized box per slot, ordered by the model's box layout.
    pub boxes: Vec<[f32; 4]>,
    /// Raw class index per slot.
    pub classes: Vec<i64>,
    /// Confidence per slot.
    pub scores: Vec<f32>,
    /// Number of defined slots.
    pub count: usize,
}

impl RawDetectionBatch {
    /// Empty batch with `capacity` zeroed slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            boxes: vec![[0.0; 4]; capacity],
            classes: vec![0; capacity],
            scores: vec![0.0; capacity],
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.scores.len()
    }
}

/// Class index from a float model output.
///
/// Non-finite or fractional values become `-1`, which no label table
/// contains, so the decoder drops the slot.
pub fn class_index(value: f32) -> i64 {
    if value.is_finite() && value.fract() == 0.0 {
        value as i64
    } else {
        -1
    }
}

/// Box in destination (display) pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// One recognized object.
///
/// Fields are open for sinks and tests. Only the decoder produces detections
/// for the pipeline, and it guarantees `score > threshold`, a known label and
/// a box clamped to the destination surface.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: String,
    pub score: f32,
    pub bounding_box: BoundingBox,
}

/// Detections for one frame, in decoder order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionSet {
    detections: Vec<Detection>,
}

impl DetectionSet {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.detections
    }

    /// Unique labels present in this set.
    pub fn labels(&self) -> BTreeSet<String> {
        self.detections.iter().map(|d| d.label.clone()).collect()
    }

    pub fn into_vec(self) -> Vec<Detection> {
        self.detections
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}

impl FromIterator<Detection> for DetectionSet {
    fn from_iter<I: IntoIterator<Item = Detection>>(iter: I) -> Self {
        Self {
            detections: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_class_outputs_keep_their_index() {
        assert_eq!(class_index(0.0), 0);
        assert_eq!(class_index(67.0), 67);
    }

    #[test]
    fn malformed_class_outputs_map_out_of_range() {
        for value in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY, 2.5, -0.5] {
            assert_eq!(class_index(value), -1, "value {}", value);
        }
    }
}
