//! sutian-autoplay
//!
//! Plays every audio clip on a dictionary result page in order, highlighting
//! the entry being played and following pagination. The engine lives in the
//! workspace crates; this crate wires it to configuration and to the on-page
//! control surface.

pub mod config;
pub mod control;

pub use config::{Config, PlaybackOptions};
pub use control::{ControlSurface, PumpExit, ALREADY_PLAYING_NOTICE};
