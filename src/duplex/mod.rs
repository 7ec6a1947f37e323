//! Full-duplex session orchestration

pub mod controller;
pub mod stats;

pub use controller::DuplexController;
pub use stats::{Direction, LinkStats, StatsSample};
