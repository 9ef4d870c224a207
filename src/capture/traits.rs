//! Capture trait definitions
//!
//! The live source is assembled from two collaborators the host provides:
//! a [`MediaSource`] (video element, camera, decoder) and a
//! [`DetectorAdapter`] (one per model family).

use crate::pose::Keyframe;
use crate::recorder::AudioTrackSource;
use crate::utils::error::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One decoded video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Media time of the frame in milliseconds
    pub timestamp_ms: f64,

    /// Packed RGBA pixels
    pub data: Arc<Vec<u8>>,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, timestamp_ms: f64, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            timestamp_ms,
            data: Arc::new(data),
        }
    }

    /// A black frame of the given size
    pub fn blank(width: u32, height: u32, timestamp_ms: f64) -> Self {
        Self::new(width, height, timestamp_ms, vec![0; width as usize * height as usize * 4])
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            1.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }
}

/// Options forwarded to a detector with every frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorOptions {
    /// Minimum confidence, 0.0 - 1.0
    pub min_confidence: f64,

    /// Maximum number of subjects to report
    pub max_subjects: usize,

    /// Report model-specific auxiliary points
    pub include_auxiliary_points: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
            max_subjects: 1,
            include_auxiliary_points: false,
        }
    }
}

impl DetectorOptions {
    /// Whether a score passes the threshold; unscored results always pass
    pub fn accepts(&self, score: Option<f64>) -> bool {
        score.map_or(true, |s| s >= self.min_confidence)
    }

    /// Drop low-confidence subjects and cap the subject count
    pub fn filter(&self, keyframes: Vec<Keyframe>) -> Vec<Keyframe> {
        keyframes
            .into_iter()
            .filter(|kf| self.accepts(kf.score))
            .take(self.max_subjects)
            .collect()
    }
}

/// Media that frames are pulled from
///
/// Times are in milliseconds. Live sources report a duration of 0.
pub trait MediaSource: Send {
    fn play(&mut self);

    fn pause(&mut self);

    fn is_playing(&self) -> bool;

    fn seek(&mut self, ms: f64);

    fn current_time(&self) -> f64;

    fn duration(&self) -> f64;

    fn set_rate(&mut self, rate: f64);

    fn set_looping(&mut self, looping: bool);

    fn set_muted(&mut self, _muted: bool) {}

    /// Whether data for the current position is available
    fn is_ready(&self) -> bool;

    /// Whether a non-looping source has played to its end
    fn has_ended(&self) -> bool {
        false
    }

    /// The frame at the current position
    fn current_frame(&mut self) -> Option<VideoFrame>;

    /// Natural frame size in pixels
    fn natural_size(&self) -> (f64, f64);

    /// The media's audio, if it has any
    fn audio_track(&mut self) -> Option<Box<dyn AudioTrackSource>> {
        None
    }

    fn aspect_ratio(&self) -> f64 {
        let (width, height) = self.natural_size();
        if height > 0.0 {
            width / height
        } else {
            1.0
        }
    }
}

/// Model-specific pose detector
///
/// Calls are serialized by the caller: `process_frame` is never invoked
/// again before the previous call has resolved.
#[async_trait]
pub trait DetectorAdapter: Send {
    /// Load the model, replacing any previously loaded one
    async fn load(&mut self) -> AppResult<()>;

    fn is_loaded(&self) -> bool;

    /// Keyframes for one frame, with points normalized to 0.0 - 1.0
    ///
    /// Returns an empty list when nothing is detected or no model is loaded.
    async fn process_frame(
        &mut self,
        frame: &VideoFrame,
        recording_start_ms: f64,
        options: &DetectorOptions,
    ) -> Vec<Keyframe>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::pose::Point;
    use crate::recorder::audio::testing::ScriptedTrack;
    use parking_lot::Mutex;

    /// Seekable media with a fixed length whose clock is moved by the test
    #[derive(Default)]
    pub struct FakeMedia {
        pub playing: bool,
        pub time: f64,
        pub duration: f64,
        pub rate: f64,
        pub looping: bool,
        pub muted: bool,
        pub ready: bool,
        pub ended: bool,
        pub audio: Option<ScriptedTrack>,
    }

    impl FakeMedia {
        pub fn new(duration: f64) -> Self {
            Self {
                duration,
                rate: 1.0,
                ready: true,
                ..Default::default()
            }
        }
    }

    impl MediaSource for FakeMedia {
        fn play(&mut self) {
            self.playing = true;
            self.ended = false;
        }
        fn pause(&mut self) {
            self.playing = false;
        }
        fn is_playing(&self) -> bool {
            self.playing
        }
        fn seek(&mut self, ms: f64) {
            self.time = ms;
        }
        fn current_time(&self) -> f64 {
            self.time
        }
        fn duration(&self) -> f64 {
            self.duration
        }
        fn set_rate(&mut self, rate: f64) {
            self.rate = rate;
        }
        fn set_looping(&mut self, looping: bool) {
            self.looping = looping;
        }
        fn set_muted(&mut self, muted: bool) {
            self.muted = muted;
        }
        fn is_ready(&self) -> bool {
            self.ready
        }
        fn has_ended(&self) -> bool {
            self.ended
        }
        fn current_frame(&mut self) -> Option<VideoFrame> {
            Some(VideoFrame::blank(4, 3, self.time))
        }
        fn natural_size(&self) -> (f64, f64) {
            (640.0, 480.0)
        }
        fn audio_track(&mut self) -> Option<Box<dyn AudioTrackSource>> {
            self.audio
                .clone()
                .map(|track| Box::new(track) as Box<dyn AudioTrackSource>)
        }
    }

    /// Detector returning one subject per frame once loaded
    #[derive(Clone, Default)]
    pub struct FakeDetector {
        pub loaded: bool,
        pub calls: Arc<Mutex<Vec<f64>>>,
    }

    #[async_trait]
    impl DetectorAdapter for FakeDetector {
        async fn load(&mut self) -> AppResult<()> {
            self.loaded = true;
            Ok(())
        }

        fn is_loaded(&self) -> bool {
            self.loaded
        }

        async fn process_frame(
            &mut self,
            frame: &VideoFrame,
            _recording_start_ms: f64,
            options: &DetectorOptions,
        ) -> Vec<Keyframe> {
            self.calls.lock().push(frame.timestamp_ms);
            if !self.loaded {
                return Vec::new();
            }
            let keyframe = Keyframe::new(
                frame.timestamp_ms,
                0,
                frame.aspect_ratio(),
                vec![Point::new(0.5, 0.5).named("nose")],
            );
            options.filter(vec![keyframe])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Point;

    fn scored(pose: u32, score: f64) -> Keyframe {
        let mut kf = Keyframe::new(0.0, pose, 1.0, vec![Point::new(0.1, 0.1)]);
        kf.score = Some(score);
        kf
    }

    #[test]
    fn test_filter_applies_threshold_and_cap() {
        let options = DetectorOptions {
            min_confidence: 0.5,
            max_subjects: 2,
            include_auxiliary_points: false,
        };
        let kept = options.filter(vec![scored(0, 0.9), scored(1, 0.2), scored(2, 0.6), scored(3, 0.7)]);
        let poses: Vec<u32> = kept.iter().map(|k| k.pose).collect();
        assert_eq!(poses, vec![0, 2]);
        assert!(options.accepts(None));
    }

    #[test]
    fn test_frame_aspect() {
        let frame = VideoFrame::blank(640, 480, 0.0);
        assert!((frame.aspect_ratio() - 4.0 / 3.0).abs() < 1e-9);
        assert_eq!(frame.data.len(), 640 * 480 * 4);
        assert_eq!(VideoFrame::blank(0, 0, 0.0).aspect_ratio(), 1.0);
    }
}
