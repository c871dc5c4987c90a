use anyhow::{anyhow, Result};
use std::collections::VecDeque;

use crate::detect::backend::{InferenceBackend, InputSpec};
use crate::detect::result::RawDetectionBatch;
use crate::ingest::normalize::{NormalizedTensor, TensorType};

/// Default slot capacity, matching the reference SSD model.
pub const DEFAULT_CAPACITY: usize = 25;

enum Response {
    Batch(RawDetectionBatch),
    Fail(String),
}

/// Backend that replays scripted outputs instead of running a model.
///
/// Queued responses are returned in order. Once the queue is empty the
/// backend keeps returning the fallback batch (an empty batch unless one was
/// set with `repeating`).
pub struct ScriptedBackend {
    spec: InputSpec,
    queue: VecDeque<Response>,
    fallback: RawDetectionBatch,
    calls: u64,
}

impl ScriptedBackend {
    pub fn new(spec: InputSpec) -> Self {
        Self {
            spec,
            queue: VecDeque::new(),
            fallback: RawDetectionBatch::with_capacity(DEFAULT_CAPACITY),
            calls: 0,
        }
    }

    /// Queue a batch for a future call.
    pub fn push_batch(&mut self, batch: RawDetectionBatch) -> &mut Self {
        self.queue.push_back(Response::Batch(batch));
        self
    }

    /// Queue a failure for a future call.
    pub fn push_failure(&mut self, message: impl Into<String>) -> &mut Self {
        self.queue.push_back(Response::Fail(message.into()));
        self
    }

    /// Return `batch` whenever the queue is empty.
    pub fn repeating(mut self, batch: RawDetectionBatch) -> Self {
        self.fallback = batch;
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn check_input(&self, tensor: &NormalizedTensor) -> Result<()> {
        if tensor.width != self.spec.width || tensor.height != self.spec.height {
            return Err(anyhow!(
                "tensor size {}x{} does not match model input {}x{}",
                tensor.width,
                tensor.height,
                self.spec.width,
                self.spec.height
            ));
        }
        if tensor.tensor_type() != self.spec.tensor_type {
            return Err(anyhow!(
                "tensor type {:?} does not match model input {:?}",
                tensor.tensor_type(),
                self.spec.tensor_type
            ));
        }
        Ok(())
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new(InputSpec {
            width: 320,
            height: 320,
            tensor_type: TensorType::U8,
        })
    }
}

impl InferenceBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn input_spec(&self) -> InputSpec {
        self.spec
    }

    fn infer(&mut self, tensor: &NormalizedTensor) -> Result<RawDetectionBatch> {
        self.calls += 1;
        self.check_input(tensor)?;
        match self.queue.pop_front() {
            Some(Response::Batch(batch)) => Ok(batch),
            Some(Response::Fail(message)) => Err(anyhow!(message)),
            None => Ok(self.fallback.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::normalize::TensorData;

    fn tensor(width: u32, height: u32) -> NormalizedTensor {
        NormalizedTensor {
            width,
            height,
            data: TensorData::U8(vec![0; (width * height * 3) as usize]),
        }
    }

    #[test]
    fn replays_queue_then_fallback() -> Result<()> {
        let mut batch = RawDetectionBatch::with_capacity(2);
        batch.count = 1;

        let mut backend = ScriptedBackend::default();
        backend.push_batch(batch.clone()).push_failure("boom");

        assert_eq!(backend.infer(&tensor(320, 320))?, batch);
        assert!(backend.infer(&tensor(320, 320)).is_err());
        let fallback = backend.infer(&tensor(320, 320))?;
        assert_eq!(fallback.count, 0);
        assert_eq!(fallback.capacity(), DEFAULT_CAPACITY);
        assert_eq!(backend.calls(), 3);
        Ok(())
    }

    #[test]
    fn rejects_mismatched_tensor() {
        let mut backend = ScriptedBackend::default();
        assert!(backend.infer(&tensor(10, 10)).is_err());
    }
}
