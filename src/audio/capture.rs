//! Microphone capture stream
//!
//! The capture callback is hard real-time: it extracts channel 0 as
//! mono, wraps the samples in a frame and does one non-blocking enqueue.
//! All resampling, processing and encoding happen later in the send
//! pipeline thread.

use cpal::traits::DeviceTrait;
use cpal::StreamConfig;
use crossbeam_channel::Sender;

use crate::audio::frame::AudioFrame;
use crate::audio::queue::SharedFrameQueue;
use crate::error::AudioError;

/// Build the input stream feeding `queue`.
///
/// `cpal::Stream` is not `Send`, so the caller must build and own the
/// stream inside the thread that keeps it alive. Runtime stream errors
/// are reported through `error_tx` rather than logged from the callback.
pub fn build_capture_stream(
    device: &cpal::Device,
    sample_rate: u32,
    chunk_samples: usize,
    queue: SharedFrameQueue,
    error_tx: Sender<AudioError>,
) -> Result<cpal::Stream, AudioError> {
    let default_config = device
        .default_input_config()
        .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;
    let channels = default_config.channels().max(1);

    let config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Fixed(chunk_samples as u32),
    };

    let stride = channels as usize;
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Channel 0 as mono, matching the send pipeline's
                // single-channel contract.
                let mono: Vec<f32> = data.iter().step_by(stride).copied().collect();
                // Drop on full; never block the driver callback.
                let _ = queue.push(AudioFrame::new(mono));
            },
            move |err| {
                let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
            },
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))?;

    Ok(stream)
}
