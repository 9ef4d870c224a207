//! Recording value and file codec
//!
//! A recording is the finalized output of one capture session. Construction
//! always goes through [`Recording::new`], which orders the keyframes, shifts
//! them so the first one sits at time 0 and derives the duration.

use super::keyframe::Keyframe;
use crate::utils::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// On-disk shape of a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordingFile {
    keyframes: Vec<Keyframe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio: Option<String>,
    #[serde(default)]
    duration: f64,
}

/// A finalized, immutable keyframe series with optional audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordingFile", into = "RecordingFile")]
pub struct Recording {
    keyframes: Vec<Keyframe>,
    audio: Option<String>,
    duration: f64,
}

impl Recording {
    /// Build a recording, normalizing keyframe times
    pub fn new(mut keyframes: Vec<Keyframe>, audio: Option<String>) -> AppResult<Self> {
        if let Some(bad) = keyframes.iter().find(|kf| !kf.time.is_finite()) {
            return Err(AppError::InvalidRecording(format!(
                "keyframe time {} is not finite",
                bad.time
            )));
        }
        if let Some(bad) = keyframes
            .iter()
            .flat_map(|kf| kf.points.iter())
            .find(|pt| !pt.is_well_formed())
        {
            return Err(AppError::InvalidRecording(format!(
                "point position must have 2 or 3 coordinates, got {}",
                bad.position.len()
            )));
        }

        // Stable, so subjects captured in the same frame keep their order
        keyframes.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(Ordering::Equal));

        if let Some(first) = keyframes.first().map(|kf| kf.time) {
            if first != 0.0 {
                for kf in &mut keyframes {
                    kf.time -= first;
                }
            }
        }

        let duration = keyframes.last().map(|kf| kf.time).unwrap_or(0.0);

        Ok(Self {
            keyframes,
            audio,
            duration,
        })
    }

    /// A recording with no keyframes
    pub fn empty() -> Self {
        Self {
            keyframes: Vec::new(),
            audio: None,
            duration: 0.0,
        }
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn audio(&self) -> Option<&str> {
        self.audio.as_deref()
    }

    /// Duration in milliseconds, equal to the last keyframe's time
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Sorted keyframe times
    pub fn times(&self) -> Vec<f64> {
        self.keyframes.iter().map(|kf| kf.time).collect()
    }

    /// Number of distinct subjects seen in the recording
    pub fn subject_count(&self) -> usize {
        self.keyframes
            .iter()
            .map(|kf| kf.pose as usize + 1)
            .max()
            .unwrap_or(0)
    }

    /// Replace the audio reference, keeping the keyframes
    pub fn with_audio(mut self, audio: Option<String>) -> Self {
        self.audio = audio;
        self
    }

    /// Parse a recording from JSON text
    pub fn from_json(text: &str) -> AppResult<Self> {
        let file: RecordingFile = serde_json::from_str(text)?;
        Self::try_from(file)
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to indented JSON
    pub fn to_json_pretty(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for Recording {
    fn default() -> Self {
        Self::empty()
    }
}

impl TryFrom<RecordingFile> for Recording {
    type Error = AppError;

    fn try_from(file: RecordingFile) -> Result<Self, Self::Error> {
        // The stored duration is informational only; it is re-derived.
        Recording::new(file.keyframes, file.audio)
    }
}

impl From<Recording> for RecordingFile {
    fn from(recording: Recording) -> Self {
        Self {
            keyframes: recording.keyframes,
            audio: recording.audio,
            duration: recording.duration,
        }
    }
}
