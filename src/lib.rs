//! # Duplex Voice Link
//!
//! Low-latency full-duplex voice between two endpoints over UDP, with a
//! pluggable processing stage (noise suppression) between capture and
//! transmission.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           ENDPOINT                               │
//! │                                                                  │
//! │  Mic callback ──► CaptureQueue ──► Send pipeline thread          │
//! │   (48 kHz)        (bounded SPSC)   │ downsample 48k→16k          │
//! │                                    │ Processor.process           │
//! │                                    │ Opus encode (20 ms)         │
//! │                                    ▼                             │
//! │                               UDP send ─────────────► peer       │
//! │                                                                  │
//! │  peer ─────────► UDP recv (100 ms timeout)                       │
//! │                                    │ Opus decode (or silence)    │
//! │                                    │ upsample 16k→48k            │
//! │                                    ▼                             │
//! │  Speaker callback ◄── PlaybackQueue ◄── Receive pipeline thread  │
//! │   (48 kHz)            (bounded SPSC)                             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both pipelines run concurrently and share only the active processor
//! index and statistics counters. Audio callbacks never block: capture
//! drops the newest frame when its queue is full, playback emits silence
//! when its queue is empty. Network loss, decode failures and processor
//! faults degrade to silence or unprocessed audio, never to a crash.

pub mod audio;
pub mod codec;
pub mod config;
pub mod dsp;
pub mod duplex;
pub mod error;
pub mod net;
pub mod processor;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Hardware sample rate for capture and playback
    pub const HW_SAMPLE_RATE: u32 = 48_000;

    /// Processing sample rate (processor and codec run at this rate)
    pub const PROC_SAMPLE_RATE: u32 = 16_000;

    /// Integer resampling ratio between hardware and processing rates
    pub const RESAMPLE_RATIO: usize = (HW_SAMPLE_RATE / PROC_SAMPLE_RATE) as usize;

    /// Codec target bitrate in bits per second
    pub const CODEC_BITRATE: u32 = 16_000;

    /// Codec frame duration in milliseconds
    pub const CODEC_FRAME_MS: u32 = 20;

    /// Codec frame length in samples at the processing rate
    pub const CODEC_FRAME_SAMPLES: usize =
        (PROC_SAMPLE_RATE as usize * CODEC_FRAME_MS as usize) / 1000;

    /// Default capture/playback chunk duration in milliseconds
    pub const DEFAULT_CHUNK_MS: u32 = 60;

    /// Default bounded queue capacity (frames)
    pub const DEFAULT_QUEUE_CAPACITY: usize = 30;

    /// Socket read timeout for the receive pipeline poll
    pub const SOCKET_TIMEOUT_MS: u64 = 100;

    /// UDP receive buffer size requested via SO_RCVBUF
    pub const UDP_RECV_BUFFER: usize = 1024 * 1024;

    /// Maximum expected UDP payload size
    pub const MAX_PACKET_SIZE: usize = 4096;

    /// Interval between rendered stats lines
    pub const STATS_INTERVAL_SECS: u64 = 5;
}
