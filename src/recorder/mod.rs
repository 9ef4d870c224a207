//! Keyframe recording
//!
//! - `KeyframeRecorder` buffers detector output during a session
//! - `AudioCapture` assembles the optional audio track in parallel
//! - `MicrophoneTrack` feeds it from the default input device (feature `native-audio`)

pub mod audio;
pub mod coordinator;
#[cfg(feature = "native-audio")]
pub mod microphone;
pub mod state;

pub use audio::{AudioChunkSink, AudioEncoder, AudioStatus, AudioTrackSource, PendingAudio};
pub use coordinator::{CapturedRecording, KeyframeRecorder};
#[cfg(feature = "native-audio")]
pub use microphone::MicrophoneTrack;
pub use state::{RecorderEvent, RecorderState, RecordingSession};
