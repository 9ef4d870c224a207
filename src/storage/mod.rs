//! Recording persistence
//!
//! Reading, writing and fetching recording files.

pub mod bundle;

pub use bundle::{load_recording, read_recording, write_recording, FileFetcher, RecordingFetcher, DEFAULT_FILE_NAME};
