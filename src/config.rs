//! Player configuration
//!
//! A typed configuration object handed to a player at construction, plus a
//! single [`ConfigChange`] notification for updates after construction.

use crate::capture::traits::DetectorOptions;
use crate::utils::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Where frames or keyframes come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSelector {
    /// No source selected yet
    None,
    /// Live camera feed
    Camera,
    /// Media or recording fetched by URI
    Uri(String),
}

impl Default for SourceSelector {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerConfig {
    /// Start playing as soon as the source is ready
    #[serde(default)]
    pub auto_start: bool,

    /// Restart from the beginning when the end is reached
    #[serde(default)]
    pub loop_on_end: bool,

    #[serde(default)]
    pub source: SourceSelector,

    /// Minimum detection confidence, 0 - 100
    #[serde(default)]
    pub min_confidence: u8,

    /// Initial playback rate multiplier
    #[serde(default = "default_playback_rate")]
    pub playback_rate: f64,

    /// Maximum number of subjects for multi-subject models
    #[serde(default = "default_max_subjects")]
    pub max_subjects: usize,

    /// Emit model-specific auxiliary points (e.g. unnamed mesh points)
    #[serde(default)]
    pub include_auxiliary_points: bool,

    /// Mute live media output
    #[serde(default)]
    pub muted: bool,
}

fn default_playback_rate() -> f64 {
    1.0
}

fn default_max_subjects() -> usize {
    1
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            auto_start: false,
            loop_on_end: false,
            source: SourceSelector::default(),
            min_confidence: 0,
            playback_rate: default_playback_rate(),
            max_subjects: default_max_subjects(),
            include_auxiliary_points: false,
            muted: false,
        }
    }
}

/// One configuration update
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigChange {
    AutoStart(bool),
    Looping(bool),
    Source(SourceSelector),
    MinConfidence(u8),
    PlaybackRate(f64),
    MaxSubjects(usize),
    IncludeAuxiliaryPoints(bool),
    Muted(bool),
}

impl PlayerConfig {
    /// Load a configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: PlayerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if !(self.playback_rate > 0.0 && self.playback_rate.is_finite()) {
            return Err(AppError::Config(format!(
                "playbackRate must be positive, got {}",
                self.playback_rate
            )));
        }
        if self.min_confidence > 100 {
            return Err(AppError::Config(format!(
                "minConfidence must be within 0-100, got {}",
                self.min_confidence
            )));
        }
        if self.max_subjects == 0 {
            return Err(AppError::Config("maxSubjects must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Confidence threshold scaled to 0.0 - 1.0
    pub fn min_confidence_ratio(&self) -> f64 {
        f64::from(self.min_confidence.min(100)) / 100.0
    }

    /// Options forwarded to the detector adapter
    pub fn detector_options(&self) -> DetectorOptions {
        DetectorOptions {
            min_confidence: self.min_confidence_ratio(),
            max_subjects: self.max_subjects,
            include_auxiliary_points: self.include_auxiliary_points,
        }
    }

    /// Apply an update, rejecting values that would fail validation
    pub fn apply(&mut self, change: ConfigChange) -> AppResult<()> {
        let mut next = self.clone();
        match change {
            ConfigChange::AutoStart(v) => next.auto_start = v,
            ConfigChange::Looping(v) => next.loop_on_end = v,
            ConfigChange::Source(v) => next.source = v,
            ConfigChange::MinConfidence(v) => next.min_confidence = v,
            ConfigChange::PlaybackRate(v) => next.playback_rate = v,
            ConfigChange::MaxSubjects(v) => next.max_subjects = v,
            ConfigChange::IncludeAuxiliaryPoints(v) => next.include_auxiliary_points = v,
            ConfigChange::Muted(v) => next.muted = v,
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: PlayerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PlayerConfig::default());
        assert_eq!(config.playback_rate, 1.0);
        assert_eq!(config.max_subjects, 1);
    }

    #[test]
    fn test_source_selector_forms() {
        let camera: PlayerConfig = serde_json::from_str(r#"{"source": "camera"}"#).unwrap();
        assert_eq!(camera.source, SourceSelector::Camera);

        let uri: PlayerConfig =
            serde_json::from_str(r#"{"source": {"uri": "./posedata.json"}}"#).unwrap();
        assert_eq!(uri.source, SourceSelector::Uri("./posedata.json".to_string()));
    }

    #[test]
    fn test_confidence_scaling() {
        let config = PlayerConfig {
            min_confidence: 35,
            max_subjects: 3,
            include_auxiliary_points: true,
            ..Default::default()
        };
        let options = config.detector_options();
        assert!((options.min_confidence - 0.35).abs() < 1e-9);
        assert_eq!(options.max_subjects, 3);
        assert!(options.include_auxiliary_points);
    }

    #[test]
    fn test_apply_rejects_invalid() {
        let mut config = PlayerConfig::default();
        assert!(config.apply(ConfigChange::PlaybackRate(0.0)).is_err());
        assert_eq!(config.playback_rate, 1.0);
        assert!(config.apply(ConfigChange::MinConfidence(101)).is_err());
        config.apply(ConfigChange::PlaybackRate(2.0)).unwrap();
        assert_eq!(config.playback_rate, 2.0);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("player.json");
        fs::write(&path, r#"{"autoStart": true, "loopOnEnd": true, "playbackRate": 0.5}"#).unwrap();

        let config = PlayerConfig::load(&path).unwrap();
        assert!(config.auto_start);
        assert!(config.loop_on_end);
        assert_eq!(config.playback_rate, 0.5);

        fs::write(&path, r#"{"maxSubjects": 0}"#).unwrap();
        assert!(matches!(PlayerConfig::load(&path), Err(AppError::Config(_))));
    }
}
