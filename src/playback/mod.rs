//! Recorded playback
//!
//! - PlaybackEngine: virtual clock, keyframe cursor, loop/step/seek/rate
//! - PosePlayer: engine + loader + configuration + audio output

pub mod engine;
pub mod player;

pub use engine::PlaybackEngine;
pub use player::{AudioOutput, PosePlayer};
