//! Pose data model
//!
//! - Keyframe / Point: one detected subject in one frame
//! - Recording: a finalized keyframe series with optional audio
//! - Nearest-keyframe search used for scrubbing

pub mod keyframe;
pub mod recording;
pub mod search;

pub use keyframe::{find_part, Keyframe, Point, PoseBounds};
pub use recording::Recording;
pub use search::{nearest_keyframe, nearest_time_index};
