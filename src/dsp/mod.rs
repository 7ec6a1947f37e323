//! Signal-processing building blocks

pub mod chunker;
pub mod resampler;

pub use chunker::FrameChunker;
pub use resampler::Resampler;
