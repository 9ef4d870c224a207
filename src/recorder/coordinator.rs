//! Keyframe recorder
//!
//! Buffers detector output while a session is active and coordinates the
//! optional audio capture that runs alongside it.

use super::audio::{AudioCapture, AudioTrackSource, PendingAudio};
use super::state::{RecorderEvent, RecorderState, RecordingSession};
use crate::clock::SharedClock;
use crate::pose::{Keyframe, Recording};
use crate::utils::error::AppResult;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Output of one finished session
///
/// The keyframes and duration are final when this is produced. The audio
/// may still be assembling; see [`PendingAudio`].
#[derive(Debug, Clone)]
pub struct CapturedRecording {
    pub session_id: Uuid,
    pub keyframes: Vec<Keyframe>,
    /// Session length in milliseconds
    pub recording_duration: f64,
    pub audio: PendingAudio,
}

impl CapturedRecording {
    /// Build a recording with whatever audio has arrived so far
    pub fn to_recording(&self) -> AppResult<Recording> {
        Recording::new(self.keyframes.clone(), self.audio.current())
    }

    /// Wait for the audio to settle, then build the recording
    pub async fn finalize(&self) -> AppResult<Recording> {
        let audio = self.audio.wait().await;
        Recording::new(self.keyframes.clone(), audio)
    }
}

/// Records detector output into an ordered keyframe buffer
pub struct KeyframeRecorder {
    clock: SharedClock,

    state: RecorderState,

    /// Keyframes of the current (or most recent) session
    keyframes: Vec<Keyframe>,

    session: Option<RecordingSession>,

    audio: Option<AudioCapture>,

    pending_audio: PendingAudio,

    audio_source: Option<Box<dyn AudioTrackSource>>,

    event_tx: broadcast::Sender<RecorderEvent>,
}

impl KeyframeRecorder {
    pub fn new(clock: SharedClock) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            clock,
            state: RecorderState::Idle,
            keyframes: Vec::new(),
            session: None,
            audio: None,
            pending_audio: PendingAudio::absent(),
            audio_source: None,
            event_tx,
        }
    }

    pub fn with_audio_source(mut self, source: Box<dyn AudioTrackSource>) -> Self {
        self.audio_source = Some(source);
        self
    }

    /// Replace the audio track used by future sessions
    pub fn set_audio_source(&mut self, source: Option<Box<dyn AudioTrackSource>>) {
        self.audio_source = source;
    }

    /// Subscribe to recorder events
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// True while a session that asked for audio is running
    pub fn is_audio_recording(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.audio_requested)
            .unwrap_or(false)
    }

    /// Elapsed session time in milliseconds, -1 when idle
    pub fn recording_duration(&self) -> f64 {
        match &self.session {
            Some(session) => session.elapsed_ms(self.clock.now_ms()),
            None => -1.0,
        }
    }

    /// Clock time at which the active session started
    pub fn session_start(&self) -> Option<f64> {
        self.session.as_ref().map(|s| s.start_ms)
    }

    /// Copy of the buffered keyframes
    pub fn keyframes(&self) -> Vec<Keyframe> {
        self.keyframes.clone()
    }

    /// Audio of the most recent session
    pub fn pending_audio(&self) -> PendingAudio {
        self.pending_audio.clone()
    }

    /// Start a session; does nothing while one is active
    pub fn start_recording(&mut self, include_audio: bool) {
        if self.is_recording() {
            tracing::debug!("Recording already active; ignoring start");
            return;
        }

        let mut session = RecordingSession::new(self.clock.now_ms(), include_audio);
        self.keyframes.clear();
        self.pending_audio = PendingAudio::absent();
        self.audio = None;

        if include_audio {
            self.start_audio(&mut session);
        }

        tracing::info!(
            "Recording started: session {} (audio: {})",
            session.id,
            session.audio_active
        );

        self.session = Some(session);
        self.state = RecorderState::Recording;
        self.emit_state();
    }

    fn start_audio(&mut self, session: &mut RecordingSession) {
        let Some(encoder) = self
            .audio_source
            .as_mut()
            .and_then(|source| source.open_encoder())
        else {
            tracing::debug!("No audio track available; recording without audio");
            return;
        };

        match AudioCapture::start(encoder) {
            Ok((capture, pending)) => {
                self.audio = Some(capture);
                self.pending_audio = pending;
                session.audio_active = true;
            }
            Err(e) => {
                tracing::warn!("Audio encoder failed to start: {}", e);
            }
        }
    }

    /// Feed one frame's detector output; returns how many keyframes were buffered
    ///
    /// Results are appended only if a session is active *now*, so output for
    /// a frame captured before a stop is dropped.
    pub fn on_detector_result(&mut self, keyframes: &[Keyframe]) -> usize {
        let Some(session) = &self.session else {
            return 0;
        };

        let time = session.elapsed_ms(self.clock.now_ms());
        self.keyframes.extend(keyframes.iter().cloned().map(|mut keyframe| {
            keyframe.time = time;
            keyframe
        }));
        keyframes.len()
    }

    /// Stop the active session; returns `None` when idle
    pub fn stop_recording(&mut self) -> Option<CapturedRecording> {
        let session = self.session.take()?;
        let recording_duration = session.elapsed_ms(self.clock.now_ms());
        self.state = RecorderState::Idle;

        if let Some(capture) = self.audio.take() {
            capture.stop();
        }

        let captured = CapturedRecording {
            session_id: session.id,
            keyframes: self.keyframes.clone(),
            recording_duration,
            audio: self.pending_audio.clone(),
        };

        tracing::info!(
            "Recording stopped: session {}, {} keyframes, {:.0}ms",
            session.id,
            captured.keyframes.len(),
            recording_duration
        );

        self.emit_state();
        let _ = self
            .event_tx
            .send(RecorderEvent::Finished(captured.clone()));

        Some(captured)
    }

    fn emit_state(&self) {
        let _ = self.event_tx.send(RecorderEvent::StateChanged {
            is_recording: self.is_recording(),
            is_audio_recording: self.is_audio_recording(),
        });
    }
}
