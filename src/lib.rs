//! videopose - pose keyframe recording and playback.
//!
//! This is the main library crate. It turns per-frame pose detector output
//! into time-ordered keyframe recordings and replays them against a virtual
//! clock, behind one control contract shared by live and recorded sources.

pub mod capture;
pub mod clock;
pub mod config;
pub mod control;
pub mod playback;
pub mod pose;
pub mod recorder;
pub mod sink;
pub mod storage;
pub mod utils;

pub use capture::{CaptureSession, DetectorAdapter, MediaSource, SessionEvent};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock, TokioClock};
pub use config::{ConfigChange, PlayerConfig, SourceSelector};
pub use control::{
    ControlAction, ControlEvent, ControlStateMachine, ControlTarget, Playback, PlayerState, Recordable,
};
pub use playback::{PlaybackEngine, PosePlayer};
pub use pose::{Keyframe, Point, Recording};
pub use recorder::{CapturedRecording, KeyframeRecorder};
pub use sink::{Bounds, VisualizationSink};
pub use utils::{AppError, AppResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the default tracing subscriber
///
/// Honors `RUST_LOG`; otherwise logs this crate at debug level. Does nothing
/// if a subscriber is already installed.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "videopose=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
