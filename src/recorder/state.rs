//! Recorder state management
//!
//! Defines the two-state recorder machine and session tracking.

use super::coordinator::CapturedRecording;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current state of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// No recording in progress
    Idle,
    /// Currently recording
    Recording,
}

impl Default for RecorderState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Information about one recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    /// Unique session ID for log correlation
    pub id: Uuid,

    /// Clock time when the session started (milliseconds)
    pub start_ms: f64,

    /// Unix timestamp when the session started
    pub unix_start_ms: i64,

    /// Whether audio was requested
    pub audio_requested: bool,

    /// Whether an audio encoder is actually running
    pub audio_active: bool,
}

impl RecordingSession {
    /// Create a new session starting at `start_ms`
    pub fn new(start_ms: f64, audio_requested: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_ms,
            unix_start_ms: Utc::now().timestamp_millis(),
            audio_requested,
            audio_active: false,
        }
    }

    /// Milliseconds elapsed since the session started
    pub fn elapsed_ms(&self, now_ms: f64) -> f64 {
        (now_ms - self.start_ms).max(0.0)
    }
}

/// Events emitted by the recorder
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// Recording flags changed
    StateChanged {
        is_recording: bool,
        is_audio_recording: bool,
    },
    /// A session finished; audio may still be arriving
    Finished(CapturedRecording),
}
