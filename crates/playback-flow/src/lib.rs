//! Playback flow - the run state machine and everything it drives
//!
//! This crate implements:
//! - Queue construction from a page scan, with raw row to queue offset mapping
//! - The run control (phase channel plus the shared delay gate)
//! - Item players for embedded-document and inline playback
//! - The sequencer that owns run state and the per-item protocol
//! - The pagination bridge and resume marker
//! - An in-memory simulated page used by the demo and the tests

pub mod control;
pub mod errors;
pub mod pagination;
pub mod player;
pub mod queue;
pub mod sequencer;
pub mod sim;

pub use control::*;
pub use errors::*;
pub use pagination::*;
pub use player::*;
pub use queue::*;
pub use sequencer::*;
