//! Voice-tuned Opus encoder and decoder
//!
//! Fixed configuration at construction: sample rate, mono, target
//! bitrate, frame duration. Samples cross the API as f32 in [-1, 1] and
//! are converted to i16 PCM at the codec boundary.

use bytes::Bytes;
use opus::{Application, Channels, Decoder, Encoder};

use crate::audio::frame::AudioFrame;
use crate::error::CodecError;

const I16_SCALE: f32 = 32_767.0;

/// Stateful Opus encoder for one send direction.
pub struct VoiceEncoder {
    encoder: Encoder,
    frame_size: usize,
    /// Reused i16 staging buffer
    pcm_buffer: Vec<i16>,
    /// Reused output buffer (max Opus packet is ~1275 bytes)
    encode_buffer: Vec<u8>,
    frames_encoded: u64,
    bytes_produced: u64,
}

impl VoiceEncoder {
    /// Create an encoder with VOIP tuning.
    ///
    /// `frame_duration_ms` fixes the frame length to
    /// `sample_rate * duration / 1000` samples; every `encode` call must
    /// supply exactly that many.
    pub fn new(sample_rate: u32, bitrate: u32, frame_duration_ms: u32) -> Result<Self, CodecError> {
        let mut encoder = Encoder::new(sample_rate, Channels::Mono, Application::Voip)
            .map_err(|e| CodecError::EncoderInit(e.to_string()))?;

        // Floor at 24 kbps: below that, narrowband voice quality drops
        // off a cliff while the packet savings are negligible.
        let effective_bitrate = bitrate.max(24_000);
        encoder
            .set_bitrate(opus::Bitrate::Bits(effective_bitrate as i32))
            .map_err(|e| CodecError::EncoderInit(format!("Failed to set bitrate: {}", e)))?;

        let frame_size = (sample_rate as usize * frame_duration_ms as usize) / 1000;

        Ok(Self {
            encoder,
            frame_size,
            pcm_buffer: vec![0i16; frame_size],
            encode_buffer: vec![0u8; 4000],
            frames_encoded: 0,
            bytes_produced: 0,
        })
    }

    /// Encode one frame to an opaque packet.
    ///
    /// On failure the caller must treat the frame as dropped and not
    /// transmit anything.
    pub fn encode(&mut self, frame: &AudioFrame) -> Result<Bytes, CodecError> {
        if frame.len() != self.frame_size {
            return Err(CodecError::InvalidFrameSize(frame.len()));
        }

        for (dst, &src) in self.pcm_buffer.iter_mut().zip(frame.samples()) {
            *dst = (src.clamp(-1.0, 1.0) * I16_SCALE) as i16;
        }

        let size = self
            .encoder
            .encode(&self.pcm_buffer, &mut self.encode_buffer)
            .map_err(|e| CodecError::EncodingFailed(e.to_string()))?;

        self.frames_encoded += 1;
        self.bytes_produced += size as u64;

        Ok(Bytes::copy_from_slice(&self.encode_buffer[..size]))
    }

    /// Frame length in samples.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }

    pub fn bytes_produced(&self) -> u64 {
        self.bytes_produced
    }
}

/// Stateful Opus decoder for one receive direction.
pub struct VoiceDecoder {
    decoder: Decoder,
    frame_size: usize,
    /// Reused i16 staging buffer
    pcm_buffer: Vec<i16>,
    frames_decoded: u64,
}

impl VoiceDecoder {
    pub fn new(sample_rate: u32, frame_duration_ms: u32) -> Result<Self, CodecError> {
        let decoder = Decoder::new(sample_rate, Channels::Mono)
            .map_err(|e| CodecError::DecoderInit(e.to_string()))?;

        let frame_size = (sample_rate as usize * frame_duration_ms as usize) / 1000;

        Ok(Self {
            decoder,
            frame_size,
            pcm_buffer: vec![0i16; frame_size],
            frames_decoded: 0,
        })
    }

    /// Decode one packet to a frame.
    ///
    /// On failure (malformed or truncated packet) the caller substitutes
    /// a silent frame; decode errors never stop the receive pipeline.
    pub fn decode(&mut self, packet: &[u8]) -> Result<AudioFrame, CodecError> {
        let decoded = self
            .decoder
            .decode(packet, &mut self.pcm_buffer, false)
            .map_err(|e| CodecError::DecodingFailed(e.to_string()))?;

        self.frames_decoded += 1;

        let samples: Vec<f32> = self.pcm_buffer[..decoded]
            .iter()
            .map(|&s| s as f32 / I16_SCALE)
            .collect();
        Ok(AudioFrame::new(samples))
    }

    /// A silent frame of the codec's frame length, substituted for lost
    /// or undecodable packets.
    pub fn silent_frame(&self) -> AudioFrame {
        AudioFrame::silent(self.frame_size)
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CODEC_BITRATE, CODEC_FRAME_MS, PROC_SAMPLE_RATE};

    fn tone_frame(freq: f32, rate: u32, len: usize, amplitude: f32) -> AudioFrame {
        let samples: Vec<f32> = (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * amplitude)
            .collect();
        AudioFrame::new(samples)
    }

    fn make_pair() -> (VoiceEncoder, VoiceDecoder) {
        let encoder = VoiceEncoder::new(PROC_SAMPLE_RATE, CODEC_BITRATE, CODEC_FRAME_MS).unwrap();
        let decoder = VoiceDecoder::new(PROC_SAMPLE_RATE, CODEC_FRAME_MS).unwrap();
        (encoder, decoder)
    }

    #[test]
    fn frame_size_is_320_samples_at_16k() {
        let (encoder, decoder) = make_pair();
        assert_eq!(encoder.frame_size(), 320);
        assert_eq!(decoder.frame_size(), 320);
    }

    #[test]
    fn wrong_frame_length_rejected() {
        let (mut encoder, _) = make_pair();
        let short = AudioFrame::silent(100);
        assert!(matches!(
            encoder.encode(&short),
            Err(CodecError::InvalidFrameSize(100))
        ));
    }

    #[test]
    fn round_trip_440hz_tone_stays_below_error_threshold() {
        let (mut encoder, mut decoder) = make_pair();
        let frame_size = encoder.frame_size();

        // Phase-continuous 440 Hz stream through the codec.
        let stream = tone_frame(440.0, PROC_SAMPLE_RATE, frame_size * 8, 0.5);
        let mut decoded_stream: Vec<f32> = Vec::new();
        for chunk in stream.samples().chunks(frame_size) {
            let frame = AudioFrame::new(chunk.to_vec());
            let packet = encoder.encode(&frame).unwrap();
            assert!(!packet.is_empty());
            let decoded = decoder.decode(&packet).unwrap();
            assert_eq!(decoded.len(), frame.len());
            decoded_stream.extend(decoded.into_samples());
        }

        // The codec introduces a fixed algorithmic delay; line the
        // streams up by best correlation before measuring error.
        let input = stream.samples();
        let lag = (0..frame_size)
            .max_by(|&a, &b| {
                let score = |lag: usize| -> f32 {
                    input
                        .iter()
                        .zip(&decoded_stream[lag..])
                        .take(frame_size * 4)
                        .map(|(x, y)| x * y)
                        .sum()
                };
                score(a).total_cmp(&score(b))
            })
            .unwrap();

        // Skip the convergence frames at the head of the stream.
        let skip = frame_size * 3;
        let mae: f32 = input[skip..]
            .iter()
            .zip(&decoded_stream[skip + lag..])
            .map(|(a, b)| (a - b).abs())
            .sum::<f32>()
            / (input.len() - skip - lag).max(1) as f32;
        assert!(mae < 0.05, "mean absolute error too high: {mae}");
    }

    #[test]
    fn silence_round_trips_to_near_silence() {
        let (mut encoder, mut decoder) = make_pair();
        let silence = AudioFrame::silent(encoder.frame_size());

        let packet = encoder.encode(&silence).unwrap();
        let decoded = decoder.decode(&packet).unwrap();
        assert!(decoded.peak() < 0.01, "silence came back loud: {}", decoded.peak());
    }

    #[test]
    fn full_scale_survives_without_blowup() {
        let (mut encoder, mut decoder) = make_pair();
        let frame = tone_frame(440.0, PROC_SAMPLE_RATE, encoder.frame_size(), 0.99);

        for _ in 0..4 {
            let packet = encoder.encode(&frame).unwrap();
            let decoded = decoder.decode(&packet).unwrap();
            assert!(decoded.peak() <= 1.2, "decoded peak out of range");
        }
    }

    #[test]
    fn garbage_packet_fails_without_panicking() {
        let (_, mut decoder) = make_pair();
        let garbage = vec![0xFFu8; 17];
        // Either outcome is tolerable as long as it is not a panic; the
        // pipeline maps Err to a silent frame.
        let _ = decoder.decode(&garbage);
        assert_eq!(decoder.silent_frame().len(), 320);
    }

    #[test]
    fn encoder_counts_frames_and_bytes() {
        let (mut encoder, _) = make_pair();
        let frame = AudioFrame::silent(encoder.frame_size());
        encoder.encode(&frame).unwrap();
        encoder.encode(&frame).unwrap();
        assert_eq!(encoder.frames_encoded(), 2);
        assert!(encoder.bytes_produced() > 0);
    }
}
