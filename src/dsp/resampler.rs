//! Polyphase sample-rate conversion
//!
//! Integer-ratio resampling between the hardware rate (48 kHz) and the
//! processing rate (16 kHz) with a windowed-sinc FIR filter bank. Each
//! call resamples one independent frame; no filter state is kept across
//! calls. Taps are centered so a downsample/upsample cascade stays
//! time-aligned, and each polyphase branch is normalized to unity DC
//! gain so levels survive the round trip.

/// Taps per polyphase branch. More taps sharpen the anti-alias cutoff
/// at the cost of per-frame latency within the filter span.
const TAPS_PER_BRANCH: usize = 16;

/// Integer-ratio polyphase resampler.
pub struct Resampler {
    ratio: usize,
    /// Prototype lowpass, length = TAPS_PER_BRANCH * ratio + 1, sum = 1.
    taps: Vec<f32>,
    /// DC gain of each polyphase branch of `taps`.
    branch_gains: Vec<f32>,
}

impl Resampler {
    /// Build a resampler for the given integer ratio (e.g. 3 for
    /// 48 kHz ↔ 16 kHz).
    pub fn new(ratio: usize) -> Self {
        assert!(ratio >= 1, "resample ratio must be at least 1");

        let taps = design_lowpass(ratio, TAPS_PER_BRANCH * ratio + 1);

        let mut branch_gains = vec![0.0f32; ratio];
        for (k, &h) in taps.iter().enumerate() {
            branch_gains[k % ratio] += h;
        }

        Self {
            ratio,
            taps,
            branch_gains,
        }
    }

    pub fn ratio(&self) -> usize {
        self.ratio
    }

    /// Hardware rate → processing rate.
    ///
    /// Output length is `round(input.len() / ratio)`; callers must not
    /// assume it equals a nominal frame size and should re-chunk before
    /// codec encoding.
    pub fn downsample(&self, input: &[f32]) -> Vec<f32> {
        if self.ratio == 1 {
            return input.to_vec();
        }
        let out_len = ((input.len() as f64) / self.ratio as f64).round() as usize;
        let center = self.taps.len() / 2;

        let mut output = Vec::with_capacity(out_len);
        for n in 0..out_len {
            let anchor = n * self.ratio + center;
            let mut acc = 0.0f32;
            for (k, &h) in self.taps.iter().enumerate() {
                if let Some(idx) = anchor.checked_sub(k) {
                    if let Some(&x) = input.get(idx) {
                        acc += h * x;
                    }
                }
            }
            output.push(acc);
        }
        output
    }

    /// Processing rate → hardware rate.
    ///
    /// Output length is exactly `input.len() * ratio`.
    pub fn upsample(&self, input: &[f32]) -> Vec<f32> {
        if self.ratio == 1 {
            return input.to_vec();
        }
        let out_len = input.len() * self.ratio;
        let center = self.taps.len() / 2;

        let mut output = Vec::with_capacity(out_len);
        for m in 0..out_len {
            let anchor = m + center;
            // Only every ratio-th zero-stuffed sample is non-zero, so
            // walk the single polyphase branch this output phase hits.
            let phase = anchor % self.ratio;
            let mut acc = 0.0f32;
            let mut t = phase;
            while t < self.taps.len() {
                if let Some(d) = anchor.checked_sub(t) {
                    let i = d / self.ratio;
                    if let Some(&x) = input.get(i) {
                        acc += self.taps[t] * x;
                    }
                }
                t += self.ratio;
            }
            let gain = self.branch_gains[phase];
            if gain.abs() > f32::EPSILON {
                acc /= gain;
            }
            output.push(acc);
        }
        output
    }
}

/// Hamming-windowed sinc lowpass with cutoff at the lower Nyquist,
/// normalized to unity DC gain.
fn design_lowpass(ratio: usize, len: usize) -> Vec<f32> {
    let center = (len - 1) as f64 / 2.0;
    // Slightly below 1/(2*ratio) to leave a transition band before the
    // aliasing region.
    let cutoff = 0.45 / ratio as f64;

    let mut taps: Vec<f64> = (0..len)
        .map(|k| {
            let t = k as f64 - center;
            let sinc = if t == 0.0 {
                2.0 * cutoff
            } else {
                (2.0 * std::f64::consts::PI * cutoff * t).sin() / (std::f64::consts::PI * t)
            };
            let window = 0.54
                - 0.46 * (2.0 * std::f64::consts::PI * k as f64 / (len - 1) as f64).cos();
            sinc * window
        })
        .collect();

    let sum: f64 = taps.iter().sum();
    for tap in &mut taps {
        *tap /= sum;
    }

    taps.into_iter().map(|t| t as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    /// Naive DFT magnitude at one frequency over the interior of the
    /// signal, skipping filter edge transients.
    fn magnitude_at(signal: &[f32], freq: f32, rate: u32) -> f32 {
        let skip = 128.min(signal.len() / 4);
        let body = &signal[skip..signal.len() - skip];
        let (mut re, mut im) = (0.0f64, 0.0f64);
        for (i, &s) in body.iter().enumerate() {
            let phase = 2.0 * std::f64::consts::PI * freq as f64 * i as f64 / rate as f64;
            re += s as f64 * phase.cos();
            im += s as f64 * phase.sin();
        }
        ((re * re + im * im).sqrt() / body.len() as f64) as f32
    }

    #[test]
    fn downsample_length_is_rounded_ratio() {
        let resampler = Resampler::new(3);
        assert_eq!(resampler.downsample(&vec![0.0; 2880]).len(), 960);
        assert_eq!(resampler.downsample(&vec![0.0; 2879]).len(), 960);
        assert_eq!(resampler.downsample(&vec![0.0; 960]).len(), 320);
    }

    #[test]
    fn upsample_length_is_exact_multiple() {
        let resampler = Resampler::new(3);
        assert_eq!(resampler.upsample(&vec![0.0; 320]).len(), 960);
        assert_eq!(resampler.upsample(&vec![0.0; 961]).len(), 2883);
    }

    #[test]
    fn ratio_one_is_identity() {
        let resampler = Resampler::new(1);
        let input = sine(440.0, 16_000, 320);
        assert_eq!(resampler.downsample(&input), input);
        assert_eq!(resampler.upsample(&input), input);
    }

    #[test]
    fn dc_level_preserved_both_directions() {
        let resampler = Resampler::new(3);
        let input = vec![0.5f32; 2880];

        let down = resampler.downsample(&input);
        let mid = &down[64..down.len() - 64];
        for &s in mid {
            assert!((s - 0.5).abs() < 1e-3, "down drift: {s}");
        }

        let up = resampler.upsample(&vec![0.5f32; 960]);
        let mid = &up[64..up.len() - 64];
        for &s in mid {
            assert!((s - 0.5).abs() < 1e-3, "up drift: {s}");
        }
    }

    #[test]
    fn round_trip_preserves_dominant_frequency() {
        let resampler = Resampler::new(3);
        let input = sine(440.0, 48_000, 4800);

        let down = resampler.downsample(&input);
        let reconstructed = resampler.upsample(&down);
        assert_eq!(reconstructed.len(), down.len() * 3);

        let at_440 = magnitude_at(&reconstructed, 440.0, 48_000);
        for other in [220.0, 880.0, 1760.0, 3520.0] {
            let m = magnitude_at(&reconstructed, other, 48_000);
            assert!(
                at_440 > 4.0 * m,
                "440 Hz not dominant: {at_440} vs {m} at {other} Hz"
            );
        }

        // Energy survives the cascade: RMS of a 0.5 tone is ~0.354.
        let body = &reconstructed[128..reconstructed.len() - 128];
        let rms = (body.iter().map(|s| s * s).sum::<f32>() / body.len() as f32).sqrt();
        assert!((rms - 0.354).abs() < 0.04, "amplitude drift: rms {rms}");
    }

    #[test]
    fn aliasing_band_is_attenuated() {
        let resampler = Resampler::new(3);
        // 12 kHz is above the 8 kHz Nyquist of the low rate and must be
        // filtered out rather than folded into the passband.
        let input = sine(12_000.0, 48_000, 4800);
        let down = resampler.downsample(&input);

        // 12 kHz aliases to 4 kHz at 16 kHz rate.
        let folded = magnitude_at(&down, 4_000.0, 16_000);
        assert!(folded < 0.02, "alias leaked: {folded}");
    }
}
