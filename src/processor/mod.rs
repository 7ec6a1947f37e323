//! Pluggable processing stages
//!
//! A processor is a named transform over one fixed-length mono frame at
//! the processing rate. The set of variants is closed: [`Bypass`],
//! [`AiDenoiser`] and [`ClassicalFilters`], selected by index in the
//! chain built by [`load_chain`]. The send pipeline reads the active
//! index once per frame; switching is a single atomic index write from
//! the control thread, visible on some subsequent frame.

pub mod bypass;
pub mod classical;
pub mod denoiser;
pub mod model;

pub use bypass::Bypass;
pub use classical::ClassicalFilters;
pub use denoiser::AiDenoiser;

use crate::audio::frame::AudioFrame;
use crate::config::SessionConfig;
use crate::constants::PROC_SAMPLE_RATE;
use crate::error::Result;

/// One processing stage in the send pipeline.
///
/// `process` must return a frame of the same length as its input and
/// must degrade internally (returning the input unchanged) rather than
/// fail; a processing fault turns into unfiltered audio, never a stalled
/// pipeline.
pub trait Processor: Send {
    fn process(&mut self, frame: &AudioFrame) -> AudioFrame;

    /// Display name for logs and the stats line.
    fn name(&self) -> &str;

    /// Drop any internal smoothing state. Not exercised by the core
    /// transport but part of the contract.
    fn reset(&mut self);
}

/// Build the full processor chain for a session:
/// `[Bypass, AiDenoiser, ClassicalFilters]`.
///
/// Model loading fails here, before the pipeline starts, even when the
/// initial selection is Bypass — runtime cycling must never reach a
/// half-loaded stage.
pub fn load_chain(config: &SessionConfig) -> Result<Vec<Box<dyn Processor>>> {
    let denoiser = AiDenoiser::load(&config.denoiser_model)?;
    Ok(vec![
        Box::new(Bypass),
        Box::new(denoiser),
        Box::new(ClassicalFilters::new(PROC_SAMPLE_RATE)),
    ])
}
