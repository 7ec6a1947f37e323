//! Identity stage, the default and the fallback

use crate::audio::frame::AudioFrame;
use crate::processor::Processor;

/// Passes frames through untouched. Side-effect free and lossless.
pub struct Bypass;

impl Processor for Bypass {
    fn process(&mut self, frame: &AudioFrame) -> AudioFrame {
        frame.clone()
    }

    fn name(&self) -> &str {
        "Bypass"
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_exact() {
        let mut bypass = Bypass;
        let frame = AudioFrame::new(vec![0.1, -0.9, 0.0, 1.0, -1.0, 0.333]);
        assert_eq!(bypass.process(&frame), frame);
    }

    #[test]
    fn identity_holds_for_silence_and_full_scale() {
        let mut bypass = Bypass;
        for frame in [AudioFrame::silent(320), AudioFrame::new(vec![1.0; 320])] {
            assert_eq!(bypass.process(&frame), frame);
        }
    }
}
