//! AI denoising stage
//!
//! Wraps a [`DenoiseModel`] resolved by name at startup. Inference
//! faults degrade to bypass for the affected frame: the caller gets the
//! input back unchanged and the pipeline keeps running.

use tracing::warn;

use crate::audio::frame::AudioFrame;
use crate::error::Result;
use crate::processor::model::{self, DenoiseModel};
use crate::processor::Processor;

pub struct AiDenoiser {
    model: Box<dyn DenoiseModel>,
    name: String,
    /// Frames that fell back to the unprocessed input
    degraded_frames: u64,
}

impl AiDenoiser {
    /// Resolve and load the named model. Failure here aborts startup.
    pub fn load(model_name: &str) -> Result<Self> {
        let model = model::load(model_name)?;
        Ok(Self::from_model(model_name, model))
    }

    /// Wrap an already-constructed model (used by tests to inject
    /// faulty models).
    pub fn from_model(model_name: &str, model: Box<dyn DenoiseModel>) -> Self {
        Self {
            model,
            name: format!("AI Denoiser ({model_name})"),
            degraded_frames: 0,
        }
    }

    pub fn degraded_frames(&self) -> u64 {
        self.degraded_frames
    }
}

impl Processor for AiDenoiser {
    fn process(&mut self, frame: &AudioFrame) -> AudioFrame {
        match self.model.infer(frame.samples()) {
            Ok(samples) if samples.len() == frame.len() => AudioFrame::new(samples),
            Ok(samples) => {
                self.degraded_frames += 1;
                warn!(
                    expected = frame.len(),
                    got = samples.len(),
                    "denoiser returned wrong frame length, passing input through"
                );
                frame.clone()
            }
            Err(e) => {
                self.degraded_frames += 1;
                warn!("denoiser inference failed, passing input through: {e}");
                frame.clone()
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&mut self) {
        self.model.reset();
    }
}
