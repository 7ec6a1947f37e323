//! Classical DSP chain: high-pass filter plus soft limiter
//!
//! An 80 Hz high-pass (two cascaded biquad sections) removes rumble,
//! then a soft limiter (threshold 0.8, ratio 10) tames peaks. Both
//! stages keep filter state across frames for continuity at frame
//! boundaries.

use crate::audio::frame::AudioFrame;
use crate::processor::Processor;

pub struct ClassicalFilters {
    highpass: [Biquad; 2],
    limiter: SoftLimiter,
}

impl ClassicalFilters {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            highpass: [
                Biquad::highpass(80.0, sample_rate),
                Biquad::highpass(80.0, sample_rate),
            ],
            limiter: SoftLimiter::new(0.8, 10.0, sample_rate),
        }
    }
}

impl Processor for ClassicalFilters {
    fn process(&mut self, frame: &AudioFrame) -> AudioFrame {
        let mut samples = frame.samples().to_vec();
        for section in &mut self.highpass {
            for s in &mut samples {
                *s = section.step(*s);
            }
        }
        for s in &mut samples {
            *s = self.limiter.step(*s);
        }
        AudioFrame::new(samples)
    }

    fn name(&self) -> &str {
        "Classical Filters"
    }

    fn reset(&mut self) {
        for section in &mut self.highpass {
            section.reset();
        }
        self.limiter.reset();
    }
}

/// Second-order high-pass section, direct form II transposed.
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    /// RBJ high-pass with Butterworth Q.
    fn highpass(cutoff_hz: f32, sample_rate: u32) -> Self {
        let q = std::f32::consts::FRAC_1_SQRT_2;
        let omega = 2.0 * std::f32::consts::PI * cutoff_hz / sample_rate as f32;
        let (sin, cos) = omega.sin_cos();
        let alpha = sin / (2.0 * q);

        let a0 = 1.0 + alpha;
        Self {
            b0: ((1.0 + cos) / 2.0) / a0,
            b1: (-(1.0 + cos)) / a0,
            b2: ((1.0 + cos) / 2.0) / a0,
            a1: (-2.0 * cos) / a0,
            a2: (1.0 - alpha) / a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    fn step(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }

    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

/// Envelope-following soft limiter.
struct SoftLimiter {
    threshold: f32,
    ratio: f32,
    attack_coeff: f32,
    release_coeff: f32,
    envelope: f32,
}

impl SoftLimiter {
    fn new(threshold: f32, ratio: f32, sample_rate: u32) -> Self {
        let attack_samples = (0.001 * sample_rate as f32).max(1.0);
        let release_samples = (0.010 * sample_rate as f32).max(1.0);
        Self {
            threshold,
            ratio,
            attack_coeff: (-1.0 / attack_samples).exp(),
            release_coeff: (-1.0 / release_samples).exp(),
            envelope: 0.0,
        }
    }

    fn step(&mut self, x: f32) -> f32 {
        let magnitude = x.abs();
        let coeff = if magnitude > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = coeff * self.envelope + (1.0 - coeff) * magnitude;

        if self.envelope <= self.threshold {
            x
        } else {
            // Compress the excursion above the threshold.
            let compressed = self.threshold + (self.envelope - self.threshold) / self.ratio;
            x * (compressed / self.envelope)
        }
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * amplitude)
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn output_length_matches_input() {
        let mut filters = ClassicalFilters::new(16_000);
        let frame = AudioFrame::new(sine(440.0, 16_000, 320, 0.5));
        assert_eq!(filters.process(&frame).len(), 320);
    }

    #[test]
    fn rumble_attenuated_voice_preserved() {
        let mut filters = ClassicalFilters::new(16_000);

        // 30 Hz rumble, well below the 80 Hz cutoff.
        let rumble = sine(30.0, 16_000, 16_000, 0.5);
        let mut out = Vec::new();
        for chunk in rumble.chunks(320) {
            out.extend(filters.process(&AudioFrame::new(chunk.to_vec())).into_samples());
        }
        let settled = &out[8000..];
        assert!(rms(settled) < 0.1, "rumble leaked: {}", rms(settled));

        filters.reset();

        // 440 Hz passes nearly untouched.
        let voice = sine(440.0, 16_000, 16_000, 0.5);
        let mut out = Vec::new();
        for chunk in voice.chunks(320) {
            out.extend(filters.process(&AudioFrame::new(chunk.to_vec())).into_samples());
        }
        let settled = &out[8000..];
        let expected = rms(&voice[8000..]);
        assert!(
            (rms(settled) - expected).abs() < expected * 0.15,
            "voice band changed: {} vs {}",
            rms(settled),
            expected
        );
    }

    #[test]
    fn limiter_caps_sustained_peaks() {
        let mut limiter = SoftLimiter::new(0.8, 10.0, 16_000);
        // Sustained near-clipping input settles just above the threshold
        // once the envelope converges.
        let mut last = 0.0f32;
        for _ in 0..16_000 {
            last = limiter.step(0.99);
        }
        assert!(last.abs() < 0.85, "limiter let {last} through");
    }

    #[test]
    fn limiter_transparent_below_threshold() {
        let mut limiter = SoftLimiter::new(0.8, 10.0, 16_000);
        for _ in 0..1000 {
            let y = limiter.step(0.3);
            assert!((y - 0.3).abs() < 1e-6);
        }
    }
}
