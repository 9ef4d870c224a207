//! Live capture session
//!
//! A media-backed source that runs every displayed frame through a detector,
//! shows the result on its sinks and records it on request. It implements
//! both the playback and the recording capability, so a
//! [`ControlStateMachine`](crate::control::ControlStateMachine) can drive it
//! exactly like a recorded player.

use super::traits::{DetectorAdapter, MediaSource};
use crate::clock::SharedClock;
use crate::config::{ConfigChange, PlayerConfig, SourceSelector};
use crate::control::{ControlTarget, Playback, PlayerState, Recordable};
use crate::pose::Keyframe;
use crate::recorder::{CapturedRecording, KeyframeRecorder, RecorderEvent};
use crate::sink::{Bounds, SinkSet, VisualizationSink};
use crate::storage::write_recording;
use crate::utils::error::{AppError, AppResult};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

/// Seek distance of one live step: one frame at 24 fps
pub const STEP_MS: f64 = 1000.0 / 24.0;

/// Events emitted by a capture session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The first detector result arrived
    TrackingStarted,
    Play,
    Pause,
    /// Periodic position update in milliseconds
    TimeUpdate(f64),
    /// The media played to its end
    Ended,
    SourceChanged(SourceSelector),
    /// A recording session started or stopped
    RecordingStateChanged {
        is_recording: bool,
        is_audio_recording: bool,
    },
    /// A recording session finished; audio may still be arriving
    CaptureFinished(CapturedRecording),
}

pub struct CaptureSession<M: MediaSource, D: DetectorAdapter> {
    media: M,
    detector: D,
    recorder: KeyframeRecorder,
    sinks: SinkSet,
    config: PlayerConfig,

    /// Visible media rectangle handed to sinks
    display: Bounds,

    /// Position as of the last timer update
    current_time: f64,

    playback_rate: f64,
    looping: bool,

    /// Run the detector once even while paused
    force_process: bool,
    tracking_started: bool,
    ended: bool,

    last_capture: Option<CapturedRecording>,
    recorder_rx: broadcast::Receiver<RecorderEvent>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl<M: MediaSource, D: DetectorAdapter> CaptureSession<M, D> {
    pub fn new(mut media: M, detector: D, clock: SharedClock, config: PlayerConfig) -> Self {
        media.set_rate(config.playback_rate);
        media.set_looping(config.loop_on_end);
        media.set_muted(config.muted);

        let (event_tx, _) = broadcast::channel(100);
        let recorder = KeyframeRecorder::new(clock);
        let recorder_rx = recorder.subscribe();
        Self {
            media,
            detector,
            recorder,
            sinks: SinkSet::new(),
            playback_rate: config.playback_rate,
            looping: config.loop_on_end,
            config,
            display: Bounds::unit(),
            current_time: 0.0,
            force_process: false,
            tracking_started: false,
            ended: false,
            last_capture: None,
            recorder_rx,
            event_tx,
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn attach_sink(&mut self, sink: Box<dyn VisualizationSink>) {
        self.sinks.attach(sink);
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn display_bounds(&self) -> Bounds {
        self.display
    }

    /// Fit the media inside a container of the given size
    pub fn set_container_size(&mut self, width: f64, height: f64) {
        if let Some(bounds) = Bounds::letterbox(width, height, self.media.aspect_ratio()) {
            self.display = bounds;
        }
    }

    /// Copy of the keyframes recorded so far
    pub fn keyframes(&self) -> Vec<Keyframe> {
        self.recorder.keyframes()
    }

    /// Output of the most recently finished recording
    pub fn last_capture(&self) -> Option<&CapturedRecording> {
        self.last_capture.as_ref()
    }

    /// Load the detector model
    pub async fn load_detector(&mut self) -> AppResult<()> {
        self.detector.load().await?;
        tracing::info!("Detector loaded");
        Ok(())
    }

    /// Run the detector for the current frame when playing, or once after a seek
    ///
    /// Returns the number of keyframes produced.
    pub async fn pose_detection_frame(&mut self) -> usize {
        if !(self.media.is_playing() || self.force_process) || !self.media.is_ready() {
            return 0;
        }
        let Some(frame) = self.media.current_frame() else {
            return 0;
        };

        let options = self.config.detector_options();
        let recording_start = self.recorder.session_start().unwrap_or(0.0);
        let keyframes = self
            .detector
            .process_frame(&frame, recording_start, &options)
            .await;
        self.force_process = false;

        let count = keyframes.len();
        self.on_pose_frame(&keyframes);
        count
    }

    /// Hand one frame's detector output to the sinks and the recorder
    pub fn on_pose_frame(&mut self, keyframes: &[Keyframe]) {
        if !self.tracking_started {
            self.tracking_started = true;
            let _ = self.event_tx.send(SessionEvent::TrackingStarted);
        }

        self.sinks.draw(keyframes, self.display);
        self.recorder.on_detector_result(keyframes);
    }

    /// Fixed-interval tick: refresh the position and notice the end of media
    pub fn on_timer_update(&mut self) -> PlayerState {
        self.current_time = self.media.current_time();
        let _ = self.event_tx.send(SessionEvent::TimeUpdate(self.current_time));

        if self.media.has_ended() && !self.ended {
            self.on_ended();
        }
        self.state()
    }

    /// The media reached its end; stops any running recording
    pub fn on_ended(&mut self) {
        self.ended = true;
        tracing::info!("Media ended at {:.0}ms", self.media.current_time());
        let _ = self.event_tx.send(SessionEvent::Ended);
        Recordable::stop_recording(self);
    }

    /// Save the last capture, waiting for its audio to settle
    pub async fn save_recording(&self, path: &Path) -> AppResult<PathBuf> {
        let captured = self
            .last_capture
            .as_ref()
            .ok_or_else(|| AppError::InvalidRecording("Nothing has been recorded".to_string()))?;
        let recording = captured.finalize().await?;
        write_recording(&recording, path)
    }

    /// Apply one configuration change
    pub fn apply_config_change(&mut self, change: ConfigChange) -> AppResult<()> {
        self.config.apply(change.clone())?;

        match change {
            ConfigChange::Looping(looping) => self.set_looping(looping),
            ConfigChange::PlaybackRate(rate) => self.set_playback_rate(rate),
            ConfigChange::Muted(muted) => self.media.set_muted(muted),
            ConfigChange::Source(source) => {
                self.ended = false;
                self.sinks.clear();
                let _ = self.event_tx.send(SessionEvent::SourceChanged(source));
            }
            // Detector options are read on every frame
            ConfigChange::AutoStart(_)
            | ConfigChange::MinConfidence(_)
            | ConfigChange::MaxSubjects(_)
            | ConfigChange::IncludeAuxiliaryPoints(_) => {}
        }
        Ok(())
    }

    /// Re-emit recorder events as session events
    fn forward_recorder_events(&mut self) {
        while let Ok(event) = self.recorder_rx.try_recv() {
            let event = match event {
                RecorderEvent::StateChanged {
                    is_recording,
                    is_audio_recording,
                } => SessionEvent::RecordingStateChanged {
                    is_recording,
                    is_audio_recording,
                },
                RecorderEvent::Finished(captured) => {
                    self.last_capture = Some(captured.clone());
                    SessionEvent::CaptureFinished(captured)
                }
            };
            let _ = self.event_tx.send(event);
        }
    }

    fn seek(&mut self, ms: f64) {
        let mut target = ms.max(0.0);
        let duration = self.media.duration();
        if duration > 0.0 {
            target = target.min(duration);
        }
        self.media.seek(target);
        self.current_time = target;
        self.force_process = true;
    }
}

impl<M: MediaSource, D: DetectorAdapter> Playback for CaptureSession<M, D> {
    fn play(&mut self) {
        let was_playing = self.media.is_playing();
        self.media.play();
        self.ended = false;
        if !was_playing && self.media.is_playing() {
            let _ = self.event_tx.send(SessionEvent::Play);
        }
    }

    fn pause(&mut self) {
        let was_playing = self.media.is_playing();
        self.media.pause();
        if was_playing {
            let _ = self.event_tx.send(SessionEvent::Pause);
        }
    }

    fn is_playing(&self) -> bool {
        self.media.is_playing()
    }

    fn step(&mut self, direction: i32) {
        self.pause();
        let position = self.media.current_time();
        self.seek(position + f64::from(direction.signum()) * STEP_MS);
    }

    fn set_current_time(&mut self, ms: f64) {
        if ms.is_finite() {
            self.seek(ms);
        }
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if !(rate.is_finite() && rate > 0.0) {
            tracing::warn!("Ignoring invalid playback rate {}", rate);
            return;
        }
        self.playback_rate = rate;
        self.media.set_rate(rate);
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
        self.media.set_looping(looping);
    }

    fn state(&self) -> PlayerState {
        let is_recording = self.recorder.is_recording();
        PlayerState {
            current_time: self.current_time,
            duration: self.media.duration(),
            is_playing: self.media.is_playing(),
            is_looping: self.looping,
            is_recording,
            is_audio_recording: is_recording && self.recorder.is_audio_recording(),
            recording_duration: self.recorder.recording_duration(),
            playback_rate: self.playback_rate,
        }
    }
}

impl<M: MediaSource, D: DetectorAdapter> Recordable for CaptureSession<M, D> {
    fn start_recording(&mut self, include_audio: bool) {
        if self.recorder.is_recording() {
            return;
        }
        let track = if include_audio {
            self.media.audio_track()
        } else {
            None
        };
        self.recorder.set_audio_source(track);
        self.recorder.start_recording(include_audio);
        self.forward_recorder_events();
    }

    fn stop_recording(&mut self) {
        self.recorder.stop_recording();
        self.forward_recorder_events();
    }

    fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    fn is_audio_recording(&self) -> bool {
        self.recorder.is_recording() && self.recorder.is_audio_recording()
    }
}

impl<M: MediaSource, D: DetectorAdapter> ControlTarget for CaptureSession<M, D> {
    fn recorder(&mut self) -> Option<&mut dyn Recordable> {
        Some(self)
    }

    fn can_record(&self) -> bool {
        true
    }
}
