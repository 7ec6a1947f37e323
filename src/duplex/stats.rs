//! Observability channel
//!
//! Workers push immutable [`StatsSample`] records onto a bounded
//! channel; the stats thread is the single consumer and owns all
//! rendering. Counters are best-effort and never used for correctness
//! decisions.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Which pipeline a sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

/// Immutable snapshot of one pipeline's counters at a point in time.
#[derive(Debug, Clone)]
pub struct StatsSample {
    pub direction: Direction,
    /// Cumulative packets sent or received
    pub packets: u64,
    /// Cumulative frames dropped (encode failure, send failure, queue full)
    pub dropped: u64,
    /// Cumulative silent frames substituted (timeouts, decode failures)
    pub silence: u64,
    /// Peak level of the most recent frame
    pub level: f32,
    /// Active processor name (send pipeline only)
    pub processor: Option<String>,
}

/// Aggregated session totals, readable through
/// [`super::DuplexController::stats`].
#[derive(Debug, Clone, Default)]
pub struct LinkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub frames_dropped: u64,
    pub silent_frames: u64,
    pub mic_level: f32,
    pub speaker_level: f32,
    pub active_processor: String,
    send_dropped: u64,
    recv_dropped: u64,
}

impl LinkStats {
    fn merge(&mut self, sample: &StatsSample) {
        // Per-sample counters are cumulative within one pipeline, so
        // keep the latest value per side and sum across sides.
        match sample.direction {
            Direction::Send => {
                self.packets_sent = sample.packets;
                self.mic_level = sample.level;
                self.send_dropped = sample.dropped;
                if let Some(name) = &sample.processor {
                    self.active_processor = name.clone();
                }
            }
            Direction::Receive => {
                self.packets_received = sample.packets;
                self.speaker_level = sample.level;
                self.recv_dropped = sample.dropped;
                self.silent_frames = sample.silence;
            }
        }
        self.frames_dropped = self.send_dropped + self.recv_dropped;
    }
}

/// Stats thread body: aggregate samples, publish the latest snapshot,
/// render a line every `interval`.
pub(crate) fn run_stats_loop(
    rx: Receiver<StatsSample>,
    running: Arc<AtomicBool>,
    snapshot: Arc<Mutex<LinkStats>>,
    interval: Duration,
) {
    let mut stats = LinkStats::default();
    let started = Instant::now();
    let mut last_render = Instant::now();
    let mut last_tx = 0u64;
    let mut last_rx = 0u64;

    while running.load(Ordering::Relaxed) {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(sample) => {
                stats.merge(&sample);
                *snapshot.lock() = stats.clone();
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_render.elapsed() >= interval {
            let secs = last_render.elapsed().as_secs_f64();
            let tx_rate = (stats.packets_sent.saturating_sub(last_tx)) as f64 / secs;
            let rx_rate = (stats.packets_received.saturating_sub(last_rx)) as f64 / secs;
            last_tx = stats.packets_sent;
            last_rx = stats.packets_received;
            last_render = Instant::now();

            tracing::info!(
                "TX {:5} ({:.1}/s) | RX {:5} ({:.1}/s) | mic {:.3} | spk {:.3} | \
                 dropped {} | silence {} | {}s | [{}]",
                stats.packets_sent,
                tx_rate,
                stats.packets_received,
                rx_rate,
                stats.mic_level,
                stats.speaker_level,
                stats.frames_dropped,
                stats.silent_frames,
                started.elapsed().as_secs(),
                stats.active_processor,
            );
        }
    }
}
