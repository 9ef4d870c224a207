//! Recording file read/write operations
//!
//! A recording file is a single JSON document holding the keyframes, the
//! optional audio reference and the duration. Remote transport is left to
//! the host: anything that can turn a URI into text implements
//! [`RecordingFetcher`].

use crate::pose::Recording;
use crate::utils::error::{AppError, AppResult};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

/// Default file name used when saving a capture
pub const DEFAULT_FILE_NAME: &str = "posedata.json";

/// Read a recording from a JSON file
pub fn read_recording(path: &Path) -> AppResult<Recording> {
    if !path.is_file() {
        return Err(AppError::Fetch(format!("{} is not a file", path.display())));
    }

    let content = fs::read_to_string(path)?;
    let recording = Recording::from_json(&content)?;

    tracing::debug!(
        "Loaded recording with {} keyframes from {:?}",
        recording.len(),
        path
    );

    Ok(recording)
}

/// Write a recording as indented JSON
///
/// When `path` is a directory the recording is written to
/// [`DEFAULT_FILE_NAME`] inside it. Returns the path written.
pub fn write_recording(recording: &Recording, path: &Path) -> AppResult<PathBuf> {
    let target = if path.is_dir() {
        path.join(DEFAULT_FILE_NAME)
    } else {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        path.to_path_buf()
    };

    fs::write(&target, recording.to_json_pretty()?)?;

    tracing::debug!(
        "Saved recording with {} keyframes to {:?}",
        recording.len(),
        target
    );

    Ok(target)
}

/// Turns a recording URI into its JSON text
#[async_trait]
pub trait RecordingFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> AppResult<String>;
}

/// Fetcher for local paths and `file://` URIs
#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    /// Base directory for relative paths
    base_dir: Option<PathBuf>,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    /// Map a URI to a local path
    pub fn resolve(&self, uri: &str) -> AppResult<PathBuf> {
        let raw = if let Some(rest) = uri.strip_prefix("file://") {
            urlencoding::decode(rest)
                .map_err(|e| AppError::Fetch(format!("Invalid file URI {}: {}", uri, e)))?
                .into_owned()
        } else if uri.contains("://") {
            return Err(AppError::Fetch(format!("Unsupported URI scheme: {}", uri)));
        } else {
            uri.to_string()
        };

        let path = PathBuf::from(raw);
        Ok(match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        })
    }
}

#[async_trait]
impl RecordingFetcher for FileFetcher {
    async fn fetch(&self, uri: &str) -> AppResult<String> {
        let path = self.resolve(uri)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AppError::Fetch(format!("{} cannot be read: {}", path.display(), e)))
    }
}

/// Fetch and parse a recording
pub async fn load_recording(fetcher: &dyn RecordingFetcher, uri: &str) -> AppResult<Recording> {
    let text = fetcher.fetch(uri).await?;
    Recording::from_json(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Keyframe, Point};
    use tempfile::tempdir;

    fn sample() -> Recording {
        Recording::new(
            vec![
                Keyframe::new(100.0, 0, 1.5, vec![Point::new(0.1, 0.2).named("nose")]),
                Keyframe::new(140.0, 0, 1.5, vec![Point::new(0.2, 0.3).named("nose")]),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_write_and_read_recording() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("captures").join("walk.json");

        let written = write_recording(&sample(), &path).unwrap();
        assert_eq!(written, path);

        let loaded = read_recording(&path).unwrap();
        assert_eq!(loaded, sample());
        assert_eq!(loaded.duration(), 40.0);
    }

    #[test]
    fn test_write_into_directory_uses_default_name() {
        let dir = tempdir().unwrap();
        let written = write_recording(&sample(), dir.path()).unwrap();
        assert_eq!(written, dir.path().join(DEFAULT_FILE_NAME));
        assert!(written.exists());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let err = read_recording(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, AppError::Fetch(_)));
    }

    #[test]
    fn test_resolve_uris() {
        let fetcher = FileFetcher::with_base_dir("/data");
        assert_eq!(
            fetcher.resolve("file:///tmp/my%20pose.json").unwrap(),
            PathBuf::from("/tmp/my pose.json")
        );
        assert_eq!(
            fetcher.resolve("sampleassets/posedata.json").unwrap(),
            PathBuf::from("/data/sampleassets/posedata.json")
        );
        assert!(fetcher.resolve("https://example.com/posedata.json").is_err());
    }

    #[tokio::test]
    async fn test_load_recording_via_fetcher() {
        let dir = tempdir().unwrap();
        write_recording(&sample(), dir.path()).unwrap();

        let fetcher = FileFetcher::with_base_dir(dir.path());
        let loaded = load_recording(&fetcher, DEFAULT_FILE_NAME).await.unwrap();
        assert_eq!(loaded.len(), 2);

        let err = load_recording(&fetcher, "missing.json").await.unwrap_err();
        assert!(matches!(err, AppError::Fetch(_)));
    }
}
