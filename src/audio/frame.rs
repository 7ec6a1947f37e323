//! Mono audio frames passed between pipeline stages

/// A fixed-length block of mono f32 samples in [-1.0, 1.0].
///
/// Length and sample rate are implicit from the pipeline stage a frame
/// sits in; they are never carried in-band. A frame is produced by one
/// stage and exclusively owned by the next.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// A frame of `len` zero samples.
    pub fn silent(len: usize) -> Self {
        Self {
            samples: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Peak absolute sample level, used by the stats reporter.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}

impl From<Vec<f32>> for AudioFrame {
    fn from(samples: Vec<f32>) -> Self {
        Self::new(samples)
    }
}
