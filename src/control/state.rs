//! Player state snapshots
//!
//! [`PlayerState`] is the flattened, copyable view of a source that gets
//! pushed to presentation layers after every mutating action.

use serde::{Deserialize, Serialize};

/// Snapshot of a player's observable state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Playback position in milliseconds
    pub current_time: f64,

    /// Total duration in milliseconds
    pub duration: f64,

    pub is_playing: bool,

    pub is_looping: bool,

    pub is_recording: bool,

    /// Only ever true while `is_recording` is true
    pub is_audio_recording: bool,

    /// Elapsed recording time in milliseconds, -1 when not recording
    pub recording_duration: f64,

    /// Playback rate multiplier, always > 0
    pub playback_rate: f64,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: 0.0,
            is_playing: false,
            is_looping: false,
            is_recording: false,
            is_audio_recording: false,
            recording_duration: -1.0,
            playback_rate: 1.0,
        }
    }
}

impl PlayerState {
    /// Position as a percentage of the duration; 0 when the duration is 0
    pub fn current_percent(&self) -> f64 {
        if self.duration > 0.0 && self.duration.is_finite() {
            (self.current_time / self.duration * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    /// Time in milliseconds corresponding to a percentage of the duration
    pub fn time_for_percent(&self, percent: f64) -> f64 {
        if self.duration > 0.0 && self.duration.is_finite() {
            percent.clamp(0.0, 100.0) / 100.0 * self.duration
        } else {
            0.0
        }
    }
}

/// Format milliseconds as `mm:ss`
pub fn format_time(ms: f64) -> String {
    if !ms.is_finite() || ms <= 0.0 {
        return "00:00".to_string();
    }
    let seconds = (ms / 1000.0).floor() as u64;
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
