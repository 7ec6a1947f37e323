//! Audio subsystem module

pub mod capture;
pub mod device;
pub mod frame;
pub mod playback;
pub mod queue;

pub use capture::build_capture_stream;
pub use device::{default_input, default_output, find_input, find_output, list_devices};
pub use frame::AudioFrame;
pub use playback::build_playback_stream;
pub use queue::{create_shared_queue, FrameQueue, SharedFrameQueue};
