//! Control events
//!
//! A control event is a closed-set action plus a value copy of the sender's
//! state at dispatch time. Recipients own their copy; nothing in it refers
//! back to the sender.

use super::state::PlayerState;
use serde::{Deserialize, Serialize};

/// Actions a control surface may dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlAction {
    TogglePlayback,
    LoopToggle,
    Scrub,
    StepForward,
    StepBackward,
    RateChange,
    RecordToggle,
    RecordWithAudioToggle,
}

impl ControlAction {
    pub const ALL: [ControlAction; 8] = [
        ControlAction::TogglePlayback,
        ControlAction::LoopToggle,
        ControlAction::Scrub,
        ControlAction::StepForward,
        ControlAction::StepBackward,
        ControlAction::RateChange,
        ControlAction::RecordToggle,
        ControlAction::RecordWithAudioToggle,
    ];

    /// Whether the action starts or stops a recording session
    pub fn is_record(&self) -> bool {
        matches!(
            self,
            ControlAction::RecordToggle | ControlAction::RecordWithAudioToggle
        )
    }
}

/// The subset of [`PlayerState`] an action needs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSnapshot {
    pub current_time: f64,
    pub duration: f64,
    pub is_playing: bool,
    pub is_looping: bool,
    pub playback_rate: f64,
    pub is_recording: bool,
    pub is_audio_recording: bool,
}

impl From<&PlayerState> for ControlSnapshot {
    fn from(state: &PlayerState) -> Self {
        Self {
            current_time: state.current_time,
            duration: state.duration,
            is_playing: state.is_playing,
            is_looping: state.is_looping,
            playback_rate: state.playback_rate,
            is_recording: state.is_recording,
            is_audio_recording: state.is_audio_recording,
        }
    }
}

impl ControlSnapshot {
    /// Snapshot carrying a scrub target given as a percentage of the duration
    pub fn from_scrub_percent(percent: f64, state: &PlayerState) -> Self {
        let mut snapshot = Self::from(state);
        snapshot.current_time = state.time_for_percent(percent);
        snapshot
    }
}

/// One dispatched control instruction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlEvent {
    pub action: ControlAction,
    pub state: ControlSnapshot,
}

impl ControlEvent {
    pub fn new(action: ControlAction, state: &PlayerState) -> Self {
        Self {
            action,
            state: ControlSnapshot::from(state),
        }
    }

    pub fn scrub(time_ms: f64, state: &PlayerState) -> Self {
        let mut event = Self::new(ControlAction::Scrub, state);
        event.state.current_time = time_ms;
        event
    }

    pub fn scrub_percent(percent: f64, state: &PlayerState) -> Self {
        Self {
            action: ControlAction::Scrub,
            state: ControlSnapshot::from_scrub_percent(percent, state),
        }
    }

    pub fn rate(rate: f64, state: &PlayerState) -> Self {
        let mut event = Self::new(ControlAction::RateChange, state);
        event.state.playback_rate = rate;
        event
    }
}

/// Which actions a control surface should offer for a given state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlAvailability {
    pub toggle_playback: bool,
    pub loop_toggle: bool,
    pub scrub: bool,
    pub step: bool,
    pub rate_change: bool,
    pub record: bool,
    pub record_with_audio: bool,
}

impl ControlAvailability {
    pub fn for_state(state: &PlayerState, can_record: bool) -> Self {
        let seekable = state.duration > 0.0;
        Self {
            toggle_playback: true,
            loop_toggle: true,
            scrub: seekable,
            step: seekable,
            rate_change: true,
            // Only the kind of recording already running may be toggled
            record: can_record && (!state.is_recording || !state.is_audio_recording),
            record_with_audio: can_record && (!state.is_recording || state.is_audio_recording),
        }
    }

    pub fn allows(&self, action: ControlAction) -> bool {
        match action {
            ControlAction::TogglePlayback => self.toggle_playback,
            ControlAction::LoopToggle => self.loop_toggle,
            ControlAction::Scrub => self.scrub,
            ControlAction::StepForward | ControlAction::StepBackward => self.step,
            ControlAction::RateChange => self.rate_change,
            ControlAction::RecordToggle => self.record,
            ControlAction::RecordWithAudioToggle => self.record_with_audio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names() {
        let names: Vec<String> = ControlAction::ALL
            .iter()
            .map(|a| serde_json::to_value(a).unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "toggle-playback",
                "loop-toggle",
                "scrub",
                "step-forward",
                "step-backward",
                "rate-change",
                "record-toggle",
                "record-with-audio-toggle"
            ]
        );
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut state = PlayerState {
            current_time: 100.0,
            duration: 1000.0,
            ..Default::default()
        };
        let event = ControlEvent::new(ControlAction::TogglePlayback, &state);
        state.current_time = 900.0;
        assert_eq!(event.state.current_time, 100.0);
    }

    #[test]
    fn test_scrub_percent() {
        let state = PlayerState {
            duration: 2000.0,
            ..Default::default()
        };
        let event = ControlEvent::scrub_percent(25.0, &state);
        assert_eq!(event.action, ControlAction::Scrub);
        assert_eq!(event.state.current_time, 500.0);

        let empty = PlayerState::default();
        assert_eq!(ControlEvent::scrub_percent(25.0, &empty).state.current_time, 0.0);
    }

    #[test]
    fn test_record_actions_exclusive() {
        let audio = PlayerState {
            is_recording: true,
            is_audio_recording: true,
            duration: 10.0,
            ..Default::default()
        };
        let avail = ControlAvailability::for_state(&audio, true);
        assert!(!avail.allows(ControlAction::RecordToggle));
        assert!(avail.allows(ControlAction::RecordWithAudioToggle));

        let plain = PlayerState {
            is_audio_recording: false,
            ..audio
        };
        let avail = ControlAvailability::for_state(&plain, true);
        assert!(avail.allows(ControlAction::RecordToggle));
        assert!(!avail.allows(ControlAction::RecordWithAudioToggle));

        let idle = ControlAvailability::for_state(&PlayerState::default(), false);
        assert!(!idle.record && !idle.record_with_audio);
        assert!(!idle.scrub && !idle.step);
    }
}
