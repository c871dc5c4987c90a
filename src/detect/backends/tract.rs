#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{InferenceBackend, InputSpec};
use crate::detect::result::{class_index, RawDetectionBatch};
use crate::ingest::normalize::{NormalizedTensor, TensorData, TensorType};

/// Output tensor positions of an SSD-style detection model.
#[derive(Clone, Copy, Debug)]
pub struct OutputLayout {
    pub boxes: usize,
    pub classes: usize,
    pub scores: usize,
    pub count: usize,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            boxes: 0,
            classes: 1,
            scores: 2,
            count: 3,
        }
    }
}

/// Tract-based backend for ONNX detection models.
///
/// Expects an NHWC input and the four post-processed outputs of an SSD /
/// EfficientDet-Lite export: boxes `[1, N, 4]`, classes `[1, N]`,
/// scores `[1, N]` and count `[1]`.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    spec: InputSpec,
    outputs: OutputLayout,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, spec: InputSpec) -> Result<Self> {
        let model_path = model_path.as_ref();
        let datum = match spec.tensor_type {
            TensorType::U8 => u8::datum_type(),
            TensorType::F32 => f32::datum_type(),
        };
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    datum,
                    tvec!(1, spec.height as usize, spec.width as usize, 3),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "tract backend loaded {} ({}x{} {:?})",
            model_path.display(),
            spec.width,
            spec.height,
            spec.tensor_type
        );

        Ok(Self {
            model,
            spec,
            outputs: OutputLayout::default(),
        })
    }

    /// Override the output tensor positions.
    pub fn with_output_layout(mut self, outputs: OutputLayout) -> Self {
        self.outputs = outputs;
        self
    }

    fn build_input(&self, tensor: &NormalizedTensor) -> Result<Tensor> {
        if tensor.width != self.spec.width || tensor.height != self.spec.height {
            return Err(anyhow!(
                "tensor size {}x{} does not match model input {}x{}",
                tensor.width,
                tensor.height,
                self.spec.width,
                self.spec.height
            ));
        }
        let shape = (1, self.spec.height as usize, self.spec.width as usize, 3);
        let input = match (&tensor.data, self.spec.tensor_type) {
            (TensorData::U8(values), TensorType::U8) => {
                tract_ndarray::Array4::from_shape_vec(shape, values.clone())?.into_tensor()
            }
            (TensorData::F32(values), TensorType::F32) => {
                tract_ndarray::Array4::from_shape_vec(shape, values.clone())?.into_tensor()
            }
            (_, expected) => {
                return Err(anyhow!(
                    "tensor type {:?} does not match model input {:?}",
                    tensor.tensor_type(),
                    expected
                ))
            }
        };
        Ok(input)
    }

    fn read_batch(&self, outputs: TVec<TValue>) -> Result<RawDetectionBatch> {
        let output = |index: usize| {
            outputs
                .get(index)
                .ok_or_else(|| anyhow!("model produced no output #{}", index))
        };

        let boxes = output(self.outputs.boxes)?
            .to_array_view::<f32>()
            .context("box output was not f32")?;
        let boxes: Vec<[f32; 4]> = boxes
            .as_slice()
            .ok_or_else(|| anyhow!("box output is not contiguous"))?
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();

        let classes: Vec<i64> = output(self.outputs.classes)?
            .to_array_view::<f32>()
            .context("class output was not f32")?
            .iter()
            .map(|&c| class_index(c))
            .collect();

        let scores: Vec<f32> = output(self.outputs.scores)?
            .to_array_view::<f32>()
            .context("score output was not f32")?
            .iter()
            .copied()
            .collect();

        let count = output(self.outputs.count)?
            .to_array_view::<f32>()
            .context("count output was not f32")?
            .iter()
            .next()
            .copied()
            .unwrap_or(0.0);

        Ok(RawDetectionBatch {
            boxes,
            classes,
            scores,
            count: if count.is_finite() && count > 0.0 {
                count as usize
            } else {
                0
            },
        })
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_spec(&self) -> InputSpec {
        self.spec
    }

    fn infer(&mut self, tensor: &NormalizedTensor) -> Result<RawDetectionBatch> {
        let input = self.build_input(tensor)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.read_batch(outputs)
    }
}
