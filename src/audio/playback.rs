//! Speaker playback stream
//!
//! The playback callback drains whole frames from the playback queue
//! through a small carry buffer (device buffer sizes need not match the
//! pipeline frame length) and zero-fills whatever it cannot cover, so an
//! empty queue degrades to silence instead of stalling the driver.

use cpal::traits::DeviceTrait;
use cpal::StreamConfig;
use crossbeam_channel::Sender;
use std::collections::VecDeque;

use crate::audio::queue::SharedFrameQueue;
use crate::error::AudioError;

/// Build the output stream draining `queue`.
///
/// Like capture, the returned stream is not `Send`; build and own it in
/// the thread that keeps it alive.
pub fn build_playback_stream(
    device: &cpal::Device,
    sample_rate: u32,
    chunk_samples: usize,
    queue: SharedFrameQueue,
    error_tx: Sender<AudioError>,
) -> Result<cpal::Stream, AudioError> {
    let default_config = device
        .default_output_config()
        .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;
    let channels = default_config.channels().max(1);

    let config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Fixed(chunk_samples as u32),
    };

    let stride = channels as usize;
    // Leftover mono samples from a frame the last callback only partly
    // consumed. Local to the callback closure, single-threaded.
    let mut carry: VecDeque<f32> = VecDeque::with_capacity(chunk_samples * 2);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let needed = data.len() / stride;

                while carry.len() < needed {
                    match queue.try_pop() {
                        Some(frame) => carry.extend(frame.into_samples()),
                        None => break,
                    }
                }

                for (i, out) in data.chunks_mut(stride).enumerate() {
                    let sample = if i < needed {
                        carry.pop_front().unwrap_or(0.0)
                    } else {
                        0.0
                    };
                    // Fan mono to every hardware channel.
                    for slot in out.iter_mut() {
                        *slot = sample;
                    }
                }
            },
            move |err| {
                let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
            },
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))?;

    Ok(stream)
}
