//! Re-chunking between variable-length sample runs and fixed codec frames
//!
//! Hardware callbacks and the resampler produce runs whose length can
//! differ from the codec's fixed frame size (rounding, device buffer
//! sizing), so the send pipeline accumulates samples here and pulls out
//! exact frames.

use crate::audio::frame::AudioFrame;

/// Accumulates samples and emits fixed-length frames.
pub struct FrameChunker {
    frame_len: usize,
    buffer: Vec<f32>,
}

impl FrameChunker {
    pub fn new(frame_len: usize) -> Self {
        assert!(frame_len > 0, "frame length must be non-zero");
        Self {
            frame_len,
            buffer: Vec::with_capacity(frame_len * 4),
        }
    }

    /// Append a run of samples.
    pub fn push(&mut self, samples: &[f32]) {
        self.buffer.extend_from_slice(samples);
    }

    /// Pull the next complete frame, if one has accumulated.
    pub fn next_frame(&mut self) -> Option<AudioFrame> {
        if self.buffer.len() < self.frame_len {
            return None;
        }
        let frame: Vec<f32> = self.buffer.drain(..self.frame_len).collect();
        Some(AudioFrame::new(frame))
    }

    /// Samples buffered but not yet emitted.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_exact_frames_across_uneven_pushes() {
        let mut chunker = FrameChunker::new(320);

        chunker.push(&vec![0.1; 100]);
        assert!(chunker.next_frame().is_none());

        chunker.push(&vec![0.1; 300]);
        let frame = chunker.next_frame().unwrap();
        assert_eq!(frame.len(), 320);
        assert!(chunker.next_frame().is_none());
        assert_eq!(chunker.pending(), 80);
    }

    #[test]
    fn preserves_sample_order() {
        let mut chunker = FrameChunker::new(4);
        chunker.push(&[1.0, 2.0, 3.0]);
        chunker.push(&[4.0, 5.0, 6.0, 7.0, 8.0]);

        let first = chunker.next_frame().unwrap();
        assert_eq!(first.samples(), &[1.0, 2.0, 3.0, 4.0]);
        let second = chunker.next_frame().unwrap();
        assert_eq!(second.samples(), &[5.0, 6.0, 7.0, 8.0]);
        assert_eq!(chunker.pending(), 0);
    }

    #[test]
    fn one_push_can_yield_multiple_frames() {
        let mut chunker = FrameChunker::new(320);
        // 60 ms at 16 kHz resamples to 960 samples = three codec frames.
        chunker.push(&vec![0.2; 960]);
        let mut count = 0;
        while chunker.next_frame().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }
}
