//! Control state machine
//!
//! Sources are assembled from independent capabilities: every source can
//! play back ([`Playback`]), some can also record ([`Recordable`]). The
//! [`ControlStateMachine`] drives either kind through the same control-event
//! contract and pushes a fresh [`PlayerState`] to its listeners after every
//! mutating action. Listeners only ever see copies.

use super::event::{ControlAction, ControlAvailability, ControlEvent};
use super::state::PlayerState;
use tokio::sync::broadcast;

/// Direction of a single step
pub const STEP_FORWARD: i32 = 1;
pub const STEP_BACKWARD: i32 = -1;

/// Play/pause/seek capability
pub trait Playback {
    fn play(&mut self);

    fn pause(&mut self);

    fn is_playing(&self) -> bool;

    /// Move by one discrete unit in `direction` (+1 / -1)
    fn step(&mut self, direction: i32);

    /// Seek to a time in milliseconds
    fn set_current_time(&mut self, ms: f64);

    fn set_playback_rate(&mut self, rate: f64);

    fn set_looping(&mut self, looping: bool);

    /// Current state as a value copy
    fn state(&self) -> PlayerState;

    fn toggle_playback(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Seek to a percentage of the duration
    fn set_current_percent(&mut self, percent: f64) {
        let time = self.state().time_for_percent(percent);
        self.set_current_time(time);
    }
}

/// Recording capability
pub trait Recordable {
    /// Start a session; a no-op while one is active
    fn start_recording(&mut self, include_audio: bool);

    /// Stop the active session; a no-op when idle
    fn stop_recording(&mut self);

    fn is_recording(&self) -> bool;

    fn is_audio_recording(&self) -> bool;
}

/// A source the control state machine can drive
pub trait ControlTarget: Playback {
    /// The recording capability, when the source has one
    fn recorder(&mut self) -> Option<&mut dyn Recordable> {
        None
    }

    fn can_record(&self) -> bool {
        false
    }
}

type StateCallback = Box<dyn FnMut(&PlayerState) + Send>;

/// Routes control events to a source and publishes its state
pub struct ControlStateMachine<T: ControlTarget> {
    target: T,
    state_tx: broadcast::Sender<PlayerState>,
    callbacks: Vec<StateCallback>,
    last_published: Option<PlayerState>,
}

impl<T: ControlTarget> ControlStateMachine<T> {
    pub fn new(target: T) -> Self {
        let (state_tx, _) = broadcast::channel(64);
        Self {
            target,
            state_tx,
            callbacks: Vec::new(),
            last_published: None,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Direct access for the clocks that drive the source
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn into_inner(self) -> T {
        self.target
    }

    pub fn state(&self) -> PlayerState {
        self.target.state()
    }

    /// Subscribe to state snapshots
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerState> {
        self.state_tx.subscribe()
    }

    /// Register a callback invoked with every published snapshot
    pub fn on_state<F>(&mut self, callback: F)
    where
        F: FnMut(&PlayerState) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    pub fn availability(&self) -> ControlAvailability {
        ControlAvailability::for_state(&self.target.state(), self.target.can_record())
    }

    /// Push the current state to every listener
    pub fn publish(&mut self) -> PlayerState {
        let state = self.target.state();
        for callback in &mut self.callbacks {
            callback(&state);
        }
        let _ = self.state_tx.send(state);
        self.last_published = Some(state);
        state
    }

    /// Publish only if the state moved since the last snapshot
    ///
    /// Catches transitions the source makes on its own, such as reaching
    /// the end of playback or stopping a recording when the media ends.
    pub fn publish_if_changed(&mut self) -> Option<PlayerState> {
        if self.last_published == Some(self.target.state()) {
            return None;
        }
        Some(self.publish())
    }

    /// Apply one control event; returns false when the action was rejected
    pub fn dispatch(&mut self, event: ControlEvent) -> bool {
        tracing::debug!("Control event: {:?}", event.action);

        let applied = match event.action {
            ControlAction::TogglePlayback => {
                self.target.toggle_playback();
                true
            }
            ControlAction::LoopToggle => {
                // The snapshot carries the value before the toggle
                self.target.set_looping(!event.state.is_looping);
                true
            }
            ControlAction::Scrub => {
                self.target.pause();
                self.target.set_current_time(event.state.current_time);
                true
            }
            ControlAction::StepForward => {
                self.target.pause();
                self.target.step(STEP_FORWARD);
                true
            }
            ControlAction::StepBackward => {
                self.target.pause();
                self.target.step(STEP_BACKWARD);
                true
            }
            ControlAction::RateChange => {
                if event.state.playback_rate > 0.0 && event.state.playback_rate.is_finite() {
                    self.target.set_playback_rate(event.state.playback_rate);
                    true
                } else {
                    tracing::warn!(
                        "Ignoring non-positive playback rate {}",
                        event.state.playback_rate
                    );
                    false
                }
            }
            ControlAction::RecordToggle => self.toggle_recording(false),
            ControlAction::RecordWithAudioToggle => self.toggle_recording(true),
        };

        if applied {
            self.publish();
        }
        applied
    }

    fn toggle_recording(&mut self, with_audio: bool) -> bool {
        let Some(recorder) = self.target.recorder() else {
            tracing::warn!("Source cannot record; ignoring record action");
            return false;
        };

        if !recorder.is_recording() {
            recorder.start_recording(with_audio);
            return true;
        }

        if recorder.is_audio_recording() != with_audio {
            tracing::warn!(
                "A recording {} audio is already running; stop it first",
                if with_audio { "without" } else { "with" }
            );
            return false;
        }

        recorder.stop_recording();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Minimal source that records calls
    #[derive(Default)]
    struct FakeSource {
        state: PlayerState,
        calls: Vec<String>,
        can_record: bool,
    }

    impl Playback for FakeSource {
        fn play(&mut self) {
            self.state.is_playing = true;
            self.calls.push("play".into());
        }
        fn pause(&mut self) {
            self.state.is_playing = false;
            self.calls.push("pause".into());
        }
        fn is_playing(&self) -> bool {
            self.state.is_playing
        }
        fn step(&mut self, direction: i32) {
            self.calls.push(format!("step {}", direction));
        }
        fn set_current_time(&mut self, ms: f64) {
            self.state.current_time = ms;
            self.calls.push(format!("seek {}", ms));
        }
        fn set_playback_rate(&mut self, rate: f64) {
            self.state.playback_rate = rate;
        }
        fn set_looping(&mut self, looping: bool) {
            self.state.is_looping = looping;
        }
        fn state(&self) -> PlayerState {
            self.state
        }
    }

    impl Recordable for FakeSource {
        fn start_recording(&mut self, include_audio: bool) {
            if self.state.is_recording {
                return;
            }
            self.state.is_recording = true;
            self.state.is_audio_recording = include_audio;
            self.calls.push(format!("start audio={}", include_audio));
        }
        fn stop_recording(&mut self) {
            self.state.is_recording = false;
            self.state.is_audio_recording = false;
            self.calls.push("stop".into());
        }
        fn is_recording(&self) -> bool {
            self.state.is_recording
        }
        fn is_audio_recording(&self) -> bool {
            self.state.is_audio_recording
        }
    }

    impl ControlTarget for FakeSource {
        fn recorder(&mut self) -> Option<&mut dyn Recordable> {
            if self.can_record {
                Some(self)
            } else {
                None
            }
        }
        fn can_record(&self) -> bool {
            self.can_record
        }
    }

    fn machine(can_record: bool) -> ControlStateMachine<FakeSource> {
        ControlStateMachine::new(FakeSource {
            can_record,
            ..Default::default()
        })
    }

    #[test]
    fn test_toggle_playback_publishes() {
        let mut m = machine(false);
        let mut rx = m.subscribe();

        let event = ControlEvent::new(ControlAction::TogglePlayback, &m.state());
        assert!(m.dispatch(event));
        assert!(m.state().is_playing);
        assert!(rx.try_recv().unwrap().is_playing);

        let event = ControlEvent::new(ControlAction::TogglePlayback, &m.state());
        m.dispatch(event);
        assert!(!m.state().is_playing);
    }

    #[test]
    fn test_loop_toggle_inverts_snapshot() {
        let mut m = machine(false);
        let before = m.state();
        m.dispatch(ControlEvent::new(ControlAction::LoopToggle, &before));
        assert!(m.state().is_looping);

        // A stale snapshot still sets the inverse of what it carried
        m.dispatch(ControlEvent::new(ControlAction::LoopToggle, &before));
        assert!(m.state().is_looping);
    }

    #[test]
    fn test_scrub_pauses_then_seeks() {
        let mut m = machine(false);
        m.target_mut().play();
        m.dispatch(ControlEvent::scrub(750.0, &m.state()));
        let calls = &m.target().calls;
        assert_eq!(&calls[calls.len() - 2..], &["pause".to_string(), "seek 750".to_string()]);
        assert!(!m.state().is_playing);
    }

    #[test]
    fn test_steps_pause_first() {
        let mut m = machine(false);
        m.dispatch(ControlEvent::new(ControlAction::StepForward, &m.state()));
        m.dispatch(ControlEvent::new(ControlAction::StepBackward, &m.state()));
        assert_eq!(
            m.target().calls,
            vec!["pause", "step 1", "pause", "step -1"]
        );
    }

    #[test]
    fn test_rate_change() {
        let mut m = machine(false);
        assert!(m.dispatch(ControlEvent::rate(2.0, &m.state())));
        assert_eq!(m.state().playback_rate, 2.0);
        assert!(!m.dispatch(ControlEvent::rate(0.0, &m.state())));
        assert_eq!(m.state().playback_rate, 2.0);
    }

    #[test]
    fn test_record_toggles_are_exclusive() {
        let mut m = machine(true);
        assert!(m.dispatch(ControlEvent::new(ControlAction::RecordWithAudioToggle, &m.state())));
        assert!(m.state().is_audio_recording);

        // Plain record toggle must not stop an audio recording
        assert!(!m.dispatch(ControlEvent::new(ControlAction::RecordToggle, &m.state())));
        assert!(m.state().is_recording);

        assert!(m.dispatch(ControlEvent::new(ControlAction::RecordWithAudioToggle, &m.state())));
        assert!(!m.state().is_recording);

        assert!(m.dispatch(ControlEvent::new(ControlAction::RecordToggle, &m.state())));
        assert!(!m.dispatch(ControlEvent::new(ControlAction::RecordWithAudioToggle, &m.state())));
        assert!(m.dispatch(ControlEvent::new(ControlAction::RecordToggle, &m.state())));
        assert!(!m.state().is_recording);
    }

    #[test]
    fn test_record_on_playback_only_source_is_rejected() {
        let mut m = machine(false);
        let mut rx = m.subscribe();
        assert!(!m.dispatch(ControlEvent::new(ControlAction::RecordToggle, &m.state())));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_callbacks_receive_copies() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut m = machine(false);
        let sink = seen.clone();
        m.on_state(move |state| sink.lock().push(*state));

        m.dispatch(ControlEvent::new(ControlAction::TogglePlayback, &m.state()));
        m.dispatch(ControlEvent::scrub(100.0, &m.state()));

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_playing);
        assert_eq!(seen[1].current_time, 100.0);
        assert!(!seen[1].is_playing);
    }

    #[test]
    fn test_publish_if_changed_catches_source_transitions() {
        let mut m = machine(true);
        let mut rx = m.subscribe();
        m.dispatch(ControlEvent::new(ControlAction::TogglePlayback, &m.state()));
        m.dispatch(ControlEvent::new(ControlAction::RecordToggle, &m.state()));
        while rx.try_recv().is_ok() {}

        // Nothing moved since the last dispatch
        assert!(m.publish_if_changed().is_none());
        assert!(rx.try_recv().is_err());

        // The source stops on its own
        m.target_mut().pause();
        m.target_mut().stop_recording();
        let published = m.publish_if_changed().unwrap();
        assert!(!published.is_playing && !published.is_recording);
        let last = rx.try_recv().unwrap();
        assert!(!last.is_playing && !last.is_recording);
        assert!(m.publish_if_changed().is_none());
    }
}
