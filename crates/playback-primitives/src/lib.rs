//! Playback primitives - the waiting building blocks of the autoplay engine
//!
//! This crate provides:
//! - The interruptible delay gate (at most one outstanding cancellable wait)
//! - Audio duration resolution with metadata probing and fallback
//! - Timing defaults shared by the players and the sequencer

pub mod delay;
pub mod duration;
pub mod errors;
pub mod types;

pub use delay::*;
pub use duration::*;
pub use errors::*;
pub use types::*;
