//! Duplex session controller
//!
//! Owns the send pipeline thread, the receive pipeline thread and the
//! stats thread. Startup is fail-fast: sockets, codecs and devices are
//! all resolved before any audio flows, and a pipeline that cannot open
//! its stream aborts `start` instead of limping along half-initialized.
//!
//! The only cross-thread state outside the bounded queues is the active
//! processor index (single writer, plain atomic), the running flag and
//! the best-effort stats counters.

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::audio::capture::build_capture_stream;
use crate::audio::device::{find_input, find_output};
use crate::audio::frame::AudioFrame;
use crate::audio::playback::build_playback_stream;
use crate::audio::queue::{create_shared_queue, SharedFrameQueue};
use crate::codec::{VoiceDecoder, VoiceEncoder};
use crate::config::SessionConfig;
use crate::constants::{
    CODEC_BITRATE, CODEC_FRAME_MS, HW_SAMPLE_RATE, PROC_SAMPLE_RATE, RESAMPLE_RATIO,
    STATS_INTERVAL_SECS,
};
use crate::dsp::{FrameChunker, Resampler};
use crate::duplex::stats::{run_stats_loop, Direction, LinkStats, StatsSample};
use crate::error::{AudioError, Error, Result};
use crate::net::{open_link, PacketReceiver, PacketSender};
use crate::processor::Processor;

/// How long the worker has to get its audio stream running.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `stop` waits for each worker before giving up on it.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Worker wait bound per loop iteration; the running flag is rechecked
/// at least this often.
const LOOP_WAIT: Duration = Duration::from_millis(100);

/// A running full-duplex voice session.
pub struct DuplexController {
    running: Arc<AtomicBool>,
    active_processor: Arc<AtomicUsize>,
    processor_names: Vec<String>,
    stats: Arc<Mutex<LinkStats>>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl DuplexController {
    /// Validate the configuration, acquire every resource, then spawn
    /// the pipelines. Any failure aborts before audio flows.
    pub fn start(config: &SessionConfig, processors: Vec<Box<dyn Processor>>) -> Result<Self> {
        config.validate()?;
        if processors.is_empty() {
            return Err(Error::Config("processor chain is empty".into()));
        }

        let processor_names: Vec<String> =
            processors.iter().map(|p| p.name().to_string()).collect();
        let initial = config.processor.chain_index().min(processors.len() - 1);

        // Fail-fast resource acquisition, all before the first spawn.
        let (packet_tx, packet_rx) = open_link(config).map_err(Error::Network)?;
        let encoder = VoiceEncoder::new(PROC_SAMPLE_RATE, CODEC_BITRATE, CODEC_FRAME_MS)
            .map_err(Error::Codec)?;
        let decoder = VoiceDecoder::new(PROC_SAMPLE_RATE, CODEC_FRAME_MS).map_err(Error::Codec)?;
        let input_device = find_input(config.input_device.as_deref()).map_err(Error::Audio)?;
        let output_device = find_output(config.output_device.as_deref()).map_err(Error::Audio)?;

        let capture_queue = create_shared_queue(config.queue_capacity);
        let playback_queue = create_shared_queue(config.queue_capacity);
        let chunk_samples = config.chunk_samples(HW_SAMPLE_RATE);

        let running = Arc::new(AtomicBool::new(true));
        let active_processor = Arc::new(AtomicUsize::new(initial));
        let stats = Arc::new(Mutex::new(LinkStats::default()));
        let (stats_tx, stats_rx) = bounded::<StatsSample>(64);

        info!(
            peer = %packet_tx.peer(),
            recv_port = config.recv_port,
            chunk_ms = config.chunk_duration_ms,
            queue_capacity = config.queue_capacity,
            processor = %processor_names[initial],
            "starting duplex session"
        );

        let mut controller = Self {
            running: running.clone(),
            active_processor: active_processor.clone(),
            processor_names,
            stats: stats.clone(),
            handles: Vec::new(),
        };

        // The cpal streams are not Send, so each pipeline builds its own
        // stream inside its thread and reports readiness back.
        let (send_ready_tx, send_ready_rx) = bounded::<Result<()>>(1);
        {
            let ctx = SendPipeline {
                running: running.clone(),
                queue: capture_queue,
                device: input_device,
                chunk_samples,
                processors,
                active: active_processor.clone(),
                encoder,
                packet_tx,
                stats_tx: stats_tx.clone(),
            };
            let handle = thread::Builder::new()
                .name("send-pipeline".into())
                .spawn(move || ctx.run(send_ready_tx))
                .map_err(|e| Error::Audio(AudioError::StreamError(e.to_string())))?;
            controller.handles.push(("send-pipeline", handle));
        }

        let (recv_ready_tx, recv_ready_rx) = bounded::<Result<()>>(1);
        {
            let ctx = ReceivePipeline {
                running: running.clone(),
                queue: playback_queue,
                device: output_device,
                chunk_samples,
                decoder,
                packet_rx,
                stats_tx,
            };
            let handle = thread::Builder::new()
                .name("recv-pipeline".into())
                .spawn(move || ctx.run(recv_ready_tx))
                .map_err(|e| Error::Audio(AudioError::StreamError(e.to_string())))?;
            controller.handles.push(("recv-pipeline", handle));
        }

        {
            let running = running.clone();
            let handle = thread::Builder::new()
                .name("stats".into())
                .spawn(move || {
                    run_stats_loop(
                        stats_rx,
                        running,
                        stats,
                        Duration::from_secs(STATS_INTERVAL_SECS),
                    )
                })
                .map_err(|e| Error::Audio(AudioError::StreamError(e.to_string())))?;
            controller.handles.push(("stats", handle));
        }

        // Wait for both streams to come up; tear everything down on the
        // first failure so the session never runs half-duplex by accident.
        for (name, ready_rx) in [("send", send_ready_rx), ("recv", recv_ready_rx)] {
            match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    controller.stop();
                    return Err(e);
                }
                Err(_) => {
                    controller.stop();
                    return Err(Error::Audio(AudioError::StreamError(format!(
                        "{name} pipeline did not start within {STARTUP_TIMEOUT:?}"
                    ))));
                }
            }
        }

        info!("duplex session running");
        Ok(controller)
    }

    /// Advance to the next processor in the chain. The switch becomes
    /// visible to the send pipeline on some subsequent frame.
    pub fn cycle_processor(&self) -> &str {
        let next =
            (self.active_processor.load(Ordering::Relaxed) + 1) % self.processor_names.len();
        self.active_processor.store(next, Ordering::Relaxed);
        let name = &self.processor_names[next];
        info!("switched processor to {}", name);
        name
    }

    /// Name of the currently selected processor.
    pub fn active_processor_name(&self) -> &str {
        let idx = self.active_processor.load(Ordering::Relaxed) % self.processor_names.len();
        &self.processor_names[idx]
    }

    /// Latest aggregated statistics snapshot.
    pub fn stats(&self) -> LinkStats {
        self.stats.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Clear the running flag and join the workers with a bounded
    /// timeout. Resources owned by a worker are released when it exits;
    /// a worker that fails to exit in time is logged and detached.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        for (name, handle) in self.handles.drain(..) {
            let deadline = Instant::now() + JOIN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                warn!("{} thread did not stop within {:?}, detaching", name, JOIN_TIMEOUT);
            }
        }
    }
}

impl Drop for DuplexController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved into the send pipeline thread.
struct SendPipeline {
    running: Arc<AtomicBool>,
    queue: SharedFrameQueue,
    device: cpal::Device,
    chunk_samples: usize,
    processors: Vec<Box<dyn Processor>>,
    active: Arc<AtomicUsize>,
    encoder: VoiceEncoder,
    packet_tx: PacketSender,
    stats_tx: Sender<StatsSample>,
}

impl SendPipeline {
    fn run(mut self, ready_tx: Sender<Result<()>>) {
        let (stream_err_tx, stream_err_rx) = bounded::<AudioError>(16);
        let stream = match build_capture_stream(
            &self.device,
            HW_SAMPLE_RATE,
            self.chunk_samples,
            self.queue.clone(),
            stream_err_tx,
        )
        .and_then(|stream| {
            use cpal::traits::StreamTrait;
            stream
                .play()
                .map_err(|e| AudioError::StreamError(e.to_string()))?;
            Ok(stream)
        }) {
            Ok(stream) => {
                let _ = ready_tx.send(Ok(()));
                stream
            }
            Err(e) => {
                let _ = ready_tx.send(Err(Error::Audio(e)));
                return;
            }
        };

        let resampler = Resampler::new(RESAMPLE_RATIO);
        let mut chunker = FrameChunker::new(self.encoder.frame_size());
        let mut dropped = 0u64;

        while self.running.load(Ordering::Relaxed) {
            if let Ok(err) = stream_err_rx.try_recv() {
                warn!("capture stream error: {err}");
            }

            let Some(frame) = self.queue.pop_timeout(LOOP_WAIT) else {
                continue;
            };
            let mic_level = frame.peak();

            chunker.push(&resampler.downsample(frame.samples()));

            let idx = self.active.load(Ordering::Relaxed) % self.processors.len();
            while let Some(chunk) = chunker.next_frame() {
                let processed = self.processors[idx].process(&chunk);
                match self.encoder.encode(&processed) {
                    Ok(packet) => {
                        if let Err(e) = self.packet_tx.send(&packet) {
                            dropped += 1;
                            warn!("send failed, dropping frame: {e}");
                        }
                    }
                    Err(e) => {
                        // Do not transmit anything for this frame.
                        dropped += 1;
                        warn!("encode failed, dropping frame: {e}");
                    }
                }
            }

            let _ = self.stats_tx.try_send(StatsSample {
                direction: Direction::Send,
                packets: self.packet_tx.packets_sent(),
                dropped,
                silence: 0,
                level: mic_level,
                processor: Some(self.processors[idx].name().to_string()),
            });
        }

        drop(stream);
    }
}

/// State moved into the receive pipeline thread.
struct ReceivePipeline {
    running: Arc<AtomicBool>,
    queue: SharedFrameQueue,
    device: cpal::Device,
    chunk_samples: usize,
    decoder: VoiceDecoder,
    packet_rx: PacketReceiver,
    stats_tx: Sender<StatsSample>,
}

impl ReceivePipeline {
    fn run(mut self, ready_tx: Sender<Result<()>>) {
        let (stream_err_tx, stream_err_rx) = bounded::<AudioError>(16);
        let stream = match build_playback_stream(
            &self.device,
            HW_SAMPLE_RATE,
            self.chunk_samples,
            self.queue.clone(),
            stream_err_tx,
        )
        .and_then(|stream| {
            use cpal::traits::StreamTrait;
            stream
                .play()
                .map_err(|e| AudioError::StreamError(e.to_string()))?;
            Ok(stream)
        }) {
            Ok(stream) => {
                let _ = ready_tx.send(Ok(()));
                stream
            }
            Err(e) => {
                let _ = ready_tx.send(Err(Error::Audio(e)));
                return;
            }
        };

        let resampler = Resampler::new(RESAMPLE_RATIO);
        let mut dropped = 0u64;
        let mut silence = 0u64;

        while self.running.load(Ordering::Relaxed) {
            if let Ok(err) = stream_err_rx.try_recv() {
                warn!("playback stream error: {err}");
            }

            // Timeouts, socket errors and undecodable packets all play
            // as one silent frame; the pipeline never stops for them.
            let frame = match self.packet_rx.recv() {
                Ok(Some(packet)) => match self.decoder.decode(&packet) {
                    Ok(frame) => frame,
                    Err(e) => {
                        silence += 1;
                        warn!("decode failed, substituting silence: {e}");
                        self.decoder.silent_frame()
                    }
                },
                Ok(None) => {
                    silence += 1;
                    self.decoder.silent_frame()
                }
                Err(e) => {
                    silence += 1;
                    warn!("receive failed, substituting silence: {e}");
                    self.decoder.silent_frame()
                }
            };
            let speaker_level = frame.peak();

            let hw_frame = AudioFrame::new(resampler.upsample(frame.samples()));
            if !self.queue.push(hw_frame) {
                dropped += 1;
            }

            let _ = self.stats_tx.try_send(StatsSample {
                direction: Direction::Receive,
                packets: self.packet_rx.packets_received(),
                dropped,
                silence,
                level: speaker_level,
                processor: None,
            });
        }

        drop(stream);
    }
}
