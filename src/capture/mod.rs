//! Live capture
//!
//! This module ties a media source and a pose detector into a recordable
//! source, and provides the loops that drive it.

pub mod driver;
pub mod session;
pub mod traits;

// Re-export traits
pub use traits::{DetectorAdapter, DetectorOptions, MediaSource, VideoFrame};

pub use driver::{spawn as spawn_driver, DriverConfig, DriverHandle, Driven};
pub use session::{CaptureSession, SessionEvent, STEP_MS};
