//! Control surface contract
//!
//! - PlayerState snapshots pushed to presentation layers
//! - ControlEvent: closed set of actions with a state copy
//! - ControlStateMachine driving any Playback (+ optional Recordable) source

pub mod event;
pub mod machine;
pub mod state;

pub use event::{ControlAction, ControlAvailability, ControlEvent, ControlSnapshot};
pub use machine::{ControlStateMachine, ControlTarget, Playback, Recordable, STEP_BACKWARD, STEP_FORWARD};
pub use state::{format_time, PlayerState};
