//! Pose player
//!
//! A playback-only source: a [`PlaybackEngine`] plus recording loading,
//! configuration and an optional audio output that follows the engine.

use super::engine::PlaybackEngine;
use crate::clock::SharedClock;
use crate::config::{ConfigChange, PlayerConfig, SourceSelector};
use crate::control::{ControlTarget, Playback, PlayerState};
use crate::pose::Recording;
use crate::sink::{Bounds, VisualizationSink};
use crate::storage::{load_recording, RecordingFetcher};
use crate::utils::error::AppResult;
use std::sync::Arc;

/// Plays the audio reference carried by a recording
pub trait AudioOutput: Send {
    /// Prepare a `data:` URI (or other reference) for playback
    fn load(&mut self, source: &str) -> AppResult<()>;

    fn play(&mut self);

    fn pause(&mut self);

    /// Seek to a position in milliseconds
    fn seek(&mut self, ms: f64);

    fn set_looping(&mut self, looping: bool);

    fn set_rate(&mut self, _rate: f64) {}

    fn set_muted(&mut self, _muted: bool) {}
}

pub struct PosePlayer {
    engine: PlaybackEngine,
    config: PlayerConfig,
    fetcher: Arc<dyn RecordingFetcher>,
    audio: Option<Box<dyn AudioOutput>>,
    /// Whether the loaded recording carried audio the output accepted
    audio_ready: bool,
    audio_playing: bool,
    uri: Option<String>,
}

impl PosePlayer {
    pub fn new(clock: SharedClock, config: PlayerConfig, fetcher: Arc<dyn RecordingFetcher>) -> Self {
        let engine = PlaybackEngine::idle(clock)
            .with_rate(config.playback_rate)
            .with_looping(config.loop_on_end);
        Self {
            engine,
            config,
            fetcher,
            audio: None,
            audio_ready: false,
            audio_playing: false,
            uri: None,
        }
    }

    pub fn with_audio_output(mut self, output: Box<dyn AudioOutput>) -> Self {
        self.audio = Some(output);
        self
    }

    pub fn attach_sink(&mut self, sink: Box<dyn VisualizationSink>) {
        self.engine.attach_sink(sink);
    }

    pub fn set_display_bounds(&mut self, bounds: Bounds) {
        self.engine.set_display_bounds(bounds);
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn recording(&self) -> &Arc<Recording> {
        self.engine.recording()
    }

    /// URI of the loaded recording
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Fetch and install a recording
    ///
    /// On failure a warning is logged and the player is left exactly as it
    /// was; the caller may retry.
    pub async fn load(&mut self, uri: &str) -> AppResult<()> {
        let recording = match load_recording(self.fetcher.as_ref(), uri).await {
            Ok(recording) => recording,
            Err(e) => {
                tracing::warn!("Error, {} cannot be loaded: {}", uri, e);
                return Err(e);
            }
        };

        self.uri = Some(uri.to_string());
        self.set_recording(recording);
        Ok(())
    }

    /// Install an already parsed recording
    pub fn set_recording(&mut self, recording: Recording) {
        self.pause();
        self.install_audio(recording.audio());
        self.engine.load(Arc::new(recording));

        if self.config.auto_start {
            self.play();
        } else {
            self.engine.render();
        }
    }

    fn install_audio(&mut self, source: Option<&str>) {
        self.audio_ready = false;
        let (Some(output), Some(source)) = (self.audio.as_mut(), source) else {
            return;
        };

        match output.load(source) {
            Ok(()) => {
                output.set_looping(self.config.loop_on_end);
                output.set_rate(self.config.playback_rate);
                output.set_muted(self.config.muted);
                self.audio_ready = true;
            }
            Err(e) => tracing::warn!("Recording audio cannot be played: {}", e),
        }
    }

    /// Load whatever the configuration points at
    pub async fn open_configured_source(&mut self) -> AppResult<()> {
        match self.config.source.clone() {
            SourceSelector::Uri(uri) => self.load(&uri).await,
            SourceSelector::Camera => {
                tracing::warn!("A pose player cannot play a live camera");
                Ok(())
            }
            SourceSelector::None => Ok(()),
        }
    }

    /// Apply one configuration change
    pub async fn apply_config_change(&mut self, change: ConfigChange) -> AppResult<()> {
        self.config.apply(change.clone())?;

        match change {
            ConfigChange::Looping(looping) => self.set_looping(looping),
            ConfigChange::PlaybackRate(rate) => self.set_playback_rate(rate),
            ConfigChange::Source(_) => self.open_configured_source().await?,
            ConfigChange::Muted(muted) => {
                if let Some(output) = self.audio.as_mut() {
                    output.set_muted(muted);
                }
            }
            // Detector options and auto-start only matter on the next load
            ConfigChange::AutoStart(_)
            | ConfigChange::MinConfidence(_)
            | ConfigChange::MaxSubjects(_)
            | ConfigChange::IncludeAuxiliaryPoints(_) => {}
        }
        Ok(())
    }

    /// Advance for one display refresh; returns whether to keep calling
    pub fn on_display_frame(&mut self) -> bool {
        let running = self.engine.on_display_frame();
        if !running && self.audio_playing {
            self.pause_audio();
        }
        running
    }

    fn pause_audio(&mut self) {
        if !self.audio_playing {
            return;
        }
        if let Some(output) = self.audio.as_mut() {
            output.pause();
        }
        self.audio_playing = false;
    }
}

impl Playback for PosePlayer {
    fn play(&mut self) {
        self.engine.play();
        if !self.engine.is_playing() || !self.audio_ready {
            return;
        }
        let position = self.engine.current_time();
        if let Some(output) = self.audio.as_mut() {
            output.seek(position);
            output.play();
            self.audio_playing = true;
        }
    }

    fn pause(&mut self) {
        self.engine.pause();
        self.pause_audio();
    }

    fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    fn step(&mut self, direction: i32) {
        self.pause_audio();
        self.engine.step(direction);
    }

    fn set_current_time(&mut self, ms: f64) {
        self.engine.set_current_time(ms);
        let position = self.engine.current_time();
        if let (true, Some(output)) = (self.audio_ready, self.audio.as_mut()) {
            output.seek(position);
        }
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.engine.set_playback_rate(rate);
        let applied = self.engine.playback_rate();
        if let Some(output) = self.audio.as_mut() {
            output.set_rate(applied);
        }
    }

    fn set_looping(&mut self, looping: bool) {
        self.engine.set_looping(looping);
        if let Some(output) = self.audio.as_mut() {
            output.set_looping(looping);
        }
    }

    fn state(&self) -> PlayerState {
        self.engine.state()
    }
}

impl ControlTarget for PosePlayer {}
