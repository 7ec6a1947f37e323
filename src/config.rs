//! Session configuration
//!
//! One immutable [`SessionConfig`] is built at startup and handed by
//! reference into every component. No component reads ambient global
//! state.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::constants::{CODEC_FRAME_MS, DEFAULT_CHUNK_MS, DEFAULT_QUEUE_CAPACITY};
use crate::error::Error;

/// Which end of the link this endpoint is.
///
/// The role only decides port assignment conventions for convenience;
/// the protocol itself is symmetric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Caller,
    Callee,
}

/// Selects the processing stage active when the session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorKind {
    Bypass,
    AiDenoiser,
    Classical,
}

impl ProcessorKind {
    /// Index of this kind in the processor chain built by
    /// [`crate::processor::load_chain`].
    pub fn chain_index(self) -> usize {
        match self {
            ProcessorKind::Bypass => 0,
            ProcessorKind::AiDenoiser => 1,
            ProcessorKind::Classical => 2,
        }
    }
}

/// Immutable per-session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Endpoint role (port assignment only)
    pub role: Role,

    /// Peer IP address
    pub peer_address: IpAddr,

    /// UDP port the peer listens on (we send to it)
    pub send_port: u16,

    /// Local UDP port we listen on
    pub recv_port: u16,

    /// Initially active processing stage
    pub processor: ProcessorKind,

    /// Model name for the AI denoiser stage
    pub denoiser_model: String,

    /// Capacity of the capture and playback queues, in frames
    pub queue_capacity: usize,

    /// Hardware capture/playback chunk duration in milliseconds
    pub chunk_duration_ms: u32,

    /// Input device name substring; `None` uses the default device
    pub input_device: Option<String>,

    /// Output device name substring; `None` uses the default device
    pub output_device: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            role: Role::Caller,
            peer_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            send_port: 5001,
            recv_port: 5002,
            processor: ProcessorKind::Bypass,
            denoiser_model: "light-32-depth4".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            chunk_duration_ms: DEFAULT_CHUNK_MS,
            input_device: None,
            output_device: None,
        }
    }
}

impl SessionConfig {
    /// Peer socket address packets are sent to.
    pub fn peer_addr(&self) -> SocketAddr {
        SocketAddr::new(self.peer_address, self.send_port)
    }

    /// Hardware chunk length in samples at the given rate.
    pub fn chunk_samples(&self, sample_rate: u32) -> usize {
        (sample_rate as usize * self.chunk_duration_ms as usize) / 1000
    }

    /// Check the configuration before the pipeline starts.
    pub fn validate(&self) -> crate::Result<()> {
        if self.send_port == self.recv_port {
            return Err(Error::Config(format!(
                "send_port and recv_port must differ (both {})",
                self.send_port
            )));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be non-zero".into()));
        }
        if self.chunk_duration_ms == 0 || self.chunk_duration_ms % CODEC_FRAME_MS != 0 {
            return Err(Error::Config(format!(
                "chunk_duration_ms must be a positive multiple of {} ms (got {})",
                CODEC_FRAME_MS, self.chunk_duration_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn same_ports_rejected() {
        let config = SessionConfig {
            send_port: 5001,
            recv_port: 5001,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn chunk_must_align_with_codec_frame() {
        let config = SessionConfig {
            chunk_duration_ms: 25,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SessionConfig {
            chunk_duration_ms: 40,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn chunk_samples_at_48k() {
        let config = SessionConfig::default();
        // 60 ms at 48 kHz
        assert_eq!(config.chunk_samples(48_000), 2880);
    }

    #[test]
    fn processor_kind_indices() {
        assert_eq!(ProcessorKind::Bypass.chain_index(), 0);
        assert_eq!(ProcessorKind::AiDenoiser.chain_index(), 1);
        assert_eq!(ProcessorKind::Classical.chain_index(), 2);
    }
}
