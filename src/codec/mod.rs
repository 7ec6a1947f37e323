//! Opus codec wrapper
//!
//! Stateful mono encoder/decoder pair tuned for voice. One instance per
//! direction per session; the instances are not thread-safe and are
//! never shared.

pub mod voice;

pub use voice::{VoiceDecoder, VoiceEncoder};
