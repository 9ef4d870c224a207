//! Playback engine
//!
//! Replays a [`Recording`] against a virtual clock:
//!
//! ```text
//! current_time = (now - session_start) * playback_rate
//! ```
//!
//! The engine owns the keyframe cursor and the virtual session start. It
//! never schedules anything itself; the host calls
//! [`PlaybackEngine::on_display_frame`] once per display refresh for as long
//! as it returns `true`.

use crate::clock::SharedClock;
use crate::control::{ControlTarget, Playback, PlayerState};
use crate::pose::{nearest_keyframe, Keyframe, Recording};
use crate::sink::{Bounds, SinkSet, VisualizationSink};
use std::sync::Arc;

pub struct PlaybackEngine {
    recording: Arc<Recording>,
    clock: SharedClock,
    sinks: SinkSet,
    display: Bounds,

    /// Index of the keyframe currently shown
    cursor: usize,

    /// Playback position in milliseconds
    current_time: f64,

    /// Clock time that corresponds to position 0 at the current rate
    session_start: f64,

    playback_rate: f64,
    looping: bool,
    playing: bool,
}

impl PlaybackEngine {
    pub fn new(recording: Arc<Recording>, clock: SharedClock) -> Self {
        let session_start = clock.now_ms();
        Self {
            recording,
            clock,
            sinks: SinkSet::new(),
            display: Bounds::unit(),
            cursor: 0,
            current_time: 0.0,
            session_start,
            playback_rate: 1.0,
            looping: false,
            playing: false,
        }
    }

    /// An engine with nothing loaded
    pub fn idle(clock: SharedClock) -> Self {
        Self::new(Arc::new(Recording::empty()), clock)
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        Playback::set_playback_rate(&mut self, rate);
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Replace the recording; stops playback, rewinds and clears the sinks
    pub fn load(&mut self, recording: Arc<Recording>) {
        tracing::info!(
            "Loaded recording: {} keyframes, {:.0}ms",
            recording.len(),
            recording.duration()
        );
        self.recording = recording;
        self.playing = false;
        self.cursor = 0;
        self.current_time = 0.0;
        self.session_start = self.clock.now_ms();
        self.sinks.clear();
    }

    pub fn recording(&self) -> &Arc<Recording> {
        &self.recording
    }

    pub fn attach_sink(&mut self, sink: Box<dyn VisualizationSink>) {
        self.sinks.attach(sink);
    }

    pub fn set_display_bounds(&mut self, bounds: Bounds) {
        self.display = bounds;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Keyframes sharing the cursor's time (one per detected subject)
    pub fn current_frame(&self) -> &[Keyframe] {
        &self.recording.keyframes()[self.frame_range()]
    }

    fn frame_range(&self) -> std::ops::Range<usize> {
        let keyframes = self.recording.keyframes();
        let Some(current) = keyframes.get(self.cursor) else {
            return 0..0;
        };

        let mut start = self.cursor;
        while start > 0 && keyframes[start - 1].time == current.time {
            start -= 1;
        }
        let mut end = self.cursor + 1;
        while end < keyframes.len() && keyframes[end].time == current.time {
            end += 1;
        }
        start..end
    }

    /// Draw the current frame to every sink
    pub fn render(&mut self) {
        let range = self.frame_range();
        if range.is_empty() {
            return;
        }
        let recording = Arc::clone(&self.recording);
        self.sinks.draw(&recording.keyframes()[range], self.display);
    }

    fn virtual_time(&self, now: f64) -> f64 {
        (now - self.session_start) * self.playback_rate
    }

    /// Advance for one display refresh
    ///
    /// Returns whether the host should keep calling.
    pub fn on_display_frame(&mut self) -> bool {
        if !self.playing {
            return false;
        }

        let len = self.recording.len();
        if len == 0 {
            self.playing = false;
            return false;
        }

        let now = self.clock.now_ms();

        if self.cursor >= len - 1 {
            if self.looping {
                self.cursor = 0;
                self.session_start = now;
                self.current_time = 0.0;
                self.render();
            } else {
                self.playing = false;
                self.current_time = self.recording.duration();
                tracing::info!("Playback reached the end");
                return false;
            }
        }

        self.current_time = self.virtual_time(now);

        let keyframes = self.recording.keyframes();
        let mut advanced = false;
        while self.cursor + 1 < len && keyframes[self.cursor + 1].time <= self.current_time {
            self.cursor += 1;
            advanced = true;
        }
        if advanced {
            self.render();
        }

        true
    }
}

impl Playback for PlaybackEngine {
    fn play(&mut self) {
        if self.playing {
            return;
        }
        if self.recording.is_empty() {
            tracing::warn!("Nothing loaded; ignoring play");
            return;
        }

        // At the end of a non-looping run, play restarts from the top
        if self.cursor >= self.recording.len() - 1 && self.current_time >= self.recording.duration() {
            self.cursor = 0;
            self.current_time = 0.0;
        }

        self.session_start = self.clock.now_ms() - self.current_time / self.playback_rate;
        self.playing = true;
        tracing::debug!("Playback started at {:.0}ms", self.current_time);
    }

    fn pause(&mut self) {
        if self.playing {
            tracing::debug!("Playback paused at {:.0}ms", self.current_time);
        }
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn step(&mut self, direction: i32) {
        self.pause();
        let len = self.recording.len();
        if len == 0 {
            return;
        }

        let target = (self.cursor as i64 + direction.signum() as i64).clamp(0, len as i64 - 1);
        self.cursor = target as usize;
        self.current_time = self.recording.keyframes()[self.cursor].time;
        self.render();
    }

    fn set_current_time(&mut self, ms: f64) {
        let ms = if ms.is_finite() { ms.max(0.0) } else { 0.0 };
        self.session_start = self.clock.now_ms() - ms / self.playback_rate;
        self.current_time = ms;

        if !self.recording.is_empty() {
            self.cursor = nearest_keyframe(self.recording.keyframes(), ms);
            self.render();
        }
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if !(rate.is_finite() && rate > 0.0) {
            tracing::warn!("Ignoring invalid playback rate {}", rate);
            return;
        }

        if self.playing {
            // Re-anchor so the position does not jump
            let now = self.clock.now_ms();
            let position = self.virtual_time(now);
            self.session_start = now - position / rate;
        }
        self.playback_rate = rate;
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn state(&self) -> PlayerState {
        PlayerState {
            current_time: self.current_time,
            duration: self.recording.duration(),
            is_playing: self.playing,
            is_looping: self.looping,
            playback_rate: self.playback_rate,
            ..Default::default()
        }
    }
}

impl ControlTarget for PlaybackEngine {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::pose::Point;
    use parking_lot::Mutex;

    /// Sink recording the time of every drawn frame
    struct TimeSink(Arc<Mutex<Vec<f64>>>);

    impl VisualizationSink for TimeSink {
        fn draw(&mut self, keyframes: &[Keyframe], _bounds: Bounds) {
            if let Some(first) = keyframes.first() {
                self.0.lock().push(first.time);
            }
        }
    }

    fn recording(times: &[f64]) -> Arc<Recording> {
        let keyframes = times
            .iter()
            .map(|t| Keyframe::new(*t, 0, 1.0, vec![Point::new(0.5, 0.5)]))
            .collect();
        Arc::new(Recording::new(keyframes, None).unwrap())
    }

    fn engine(times: &[f64]) -> (ManualClock, Arc<Mutex<Vec<f64>>>, PlaybackEngine) {
        let clock = ManualClock::new(10_000.0);
        let drawn = Arc::new(Mutex::new(Vec::new()));
        let mut engine = PlaybackEngine::new(recording(times), Arc::new(clock.clone()));
        engine.attach_sink(Box::new(TimeSink(drawn.clone())));
        (clock, drawn, engine)
    }

    #[test]
    fn test_advances_with_clock() {
        let (clock, drawn, mut e) = engine(&[0.0, 100.0, 200.0, 300.0]);
        e.play();
        clock.advance(150.0);
        assert!(e.on_display_frame());
        assert_eq!(e.cursor(), 1);
        assert_eq!(e.current_time(), 150.0);

        // A slow frame skips keyframes but draws once
        clock.advance(140.0);
        e.on_display_frame();
        assert_eq!(e.cursor(), 2);
        assert_eq!(*drawn.lock(), vec![100.0, 200.0]);
    }

    #[test]
    fn test_rate_scales_virtual_time() {
        let (clock, _, mut e) = engine(&[0.0, 500.0, 1000.0]);
        e.set_playback_rate(2.0);
        e.play();
        clock.advance(250.0);
        e.on_display_frame();
        assert_eq!(e.current_time(), 500.0);
        assert_eq!(e.cursor(), 1);
    }

    #[test]
    fn test_rate_change_keeps_position() {
        let (clock, _, mut e) = engine(&[0.0, 500.0, 1000.0, 2000.0]);
        e.play();
        clock.advance(400.0);
        e.on_display_frame();
        e.set_playback_rate(2.0);
        e.on_display_frame();
        assert_eq!(e.current_time(), 400.0);
        clock.advance(100.0);
        e.on_display_frame();
        assert_eq!(e.current_time(), 600.0);

        e.set_playback_rate(0.0);
        e.set_playback_rate(-1.0);
        assert_eq!(e.playback_rate(), 2.0);
    }

    #[test]
    fn test_end_without_loop_stops() {
        let (clock, _, mut e) = engine(&[0.0, 100.0, 200.0]);
        e.play();
        clock.advance(250.0);
        assert!(e.on_display_frame());
        assert_eq!(e.cursor(), 2);

        clock.advance(16.0);
        assert!(!e.on_display_frame());
        assert!(!e.is_playing());

        clock.advance(500.0);
        assert!(!e.on_display_frame());
        assert_eq!(e.cursor(), 2);
        assert_eq!(e.state().current_time, 200.0);
    }

    #[test]
    fn test_end_with_loop_restarts() {
        let (clock, drawn, mut e) = engine(&[0.0, 100.0, 200.0]);
        e.set_looping(true);
        e.play();
        clock.advance(210.0);
        e.on_display_frame();
        assert_eq!(e.cursor(), 2);

        clock.advance(16.0);
        assert!(e.on_display_frame());
        assert!(e.is_playing());
        assert_eq!(e.cursor(), 0);
        assert_eq!(e.current_time(), 0.0);
        assert_eq!(drawn.lock().last(), Some(&0.0));

        // No jump larger than the frame interval after the wrap
        clock.advance(16.0);
        e.on_display_frame();
        assert_eq!(e.current_time(), 16.0);
        assert_eq!(e.cursor(), 0);
    }

    #[test]
    fn test_seek_during_playback_never_regresses() {
        let (clock, drawn, mut e) = engine(&[0.0, 500.0, 1000.0, 1500.0]);
        e.play();
        clock.advance(100.0);
        e.on_display_frame();

        e.set_current_time(750.0);
        // Ties go to the earlier keyframe; drawn immediately
        assert_eq!(e.cursor(), 1);
        assert_eq!(drawn.lock().last(), Some(&500.0));

        clock.advance(16.0);
        e.on_display_frame();
        assert!(e.current_time() >= 750.0);
    }

    #[test]
    fn test_seek_at_rate_keeps_position() {
        let (clock, _, mut e) = engine(&[0.0, 500.0, 1000.0, 3000.0]);
        e.set_playback_rate(2.0);
        e.play();
        e.set_current_time(800.0);
        assert_eq!(e.cursor(), 2);
        clock.advance(50.0);
        e.on_display_frame();
        assert_eq!(e.current_time(), 900.0);
    }

    #[test]
    fn test_step_pauses_and_clamps() {
        let (_, drawn, mut e) = engine(&[0.0, 100.0, 200.0]);
        e.play();
        e.step(1);
        assert!(!e.is_playing());
        assert_eq!(e.cursor(), 1);
        assert_eq!(e.current_time(), 100.0);

        e.step(1);
        e.step(1);
        assert_eq!(e.cursor(), 2);

        e.step(-1);
        e.step(-1);
        e.step(-1);
        assert_eq!(e.cursor(), 0);
        assert_eq!(*drawn.lock(), vec![100.0, 200.0, 200.0, 100.0, 0.0, 0.0]);
    }

    #[test]
    fn test_pause_halts_advance() {
        let (clock, _, mut e) = engine(&[0.0, 100.0, 200.0]);
        e.play();
        e.pause();
        clock.advance(150.0);
        assert!(!e.on_display_frame());
        assert_eq!(e.cursor(), 0);

        // Resuming continues from the paused position
        e.play();
        clock.advance(120.0);
        e.on_display_frame();
        assert_eq!(e.current_time(), 120.0);
        assert_eq!(e.cursor(), 1);
    }

    #[test]
    fn test_play_at_end_restarts() {
        let (clock, _, mut e) = engine(&[0.0, 100.0]);
        e.play();
        clock.advance(150.0);
        e.on_display_frame();
        e.on_display_frame();
        assert!(!e.is_playing());

        e.play();
        assert_eq!(e.cursor(), 0);
        assert_eq!(e.current_time(), 0.0);
    }

    #[test]
    fn test_empty_recording() {
        let clock = ManualClock::new(0.0);
        let mut e = PlaybackEngine::idle(Arc::new(clock));
        e.play();
        assert!(!e.is_playing());
        e.set_current_time(100.0);
        e.step(1);
        assert_eq!(e.cursor(), 0);
        assert_eq!(e.state().current_percent(), 0.0);
    }

    #[test]
    fn test_multi_subject_frame() {
        let keyframes = vec![
            Keyframe::new(0.0, 0, 1.0, vec![Point::new(0.1, 0.1)]),
            Keyframe::new(0.0, 1, 1.0, vec![Point::new(0.9, 0.9)]),
            Keyframe::new(40.0, 0, 1.0, vec![Point::new(0.2, 0.2)]),
        ];
        let clock = ManualClock::new(0.0);
        let mut e = PlaybackEngine::new(
            Arc::new(Recording::new(keyframes, None).unwrap()),
            Arc::new(clock),
        );
        e.set_current_time(0.0);
        assert_eq!(e.current_frame().len(), 2);
        e.step(1);
        assert_eq!(e.current_frame().len(), 2);
        e.step(1);
        assert_eq!(e.current_frame().len(), 1);
    }

    struct ClearCounter(Arc<Mutex<usize>>);

    impl VisualizationSink for ClearCounter {
        fn draw(&mut self, _keyframes: &[Keyframe], _bounds: Bounds) {}

        fn clear(&mut self) {
            *self.0.lock() += 1;
        }
    }

    #[test]
    fn test_load_clears_sinks() {
        let (_, _, mut e) = engine(&[0.0, 100.0]);
        let clears = Arc::new(Mutex::new(0));
        e.attach_sink(Box::new(ClearCounter(clears.clone())));
        e.set_current_time(100.0);

        e.load(recording(&[0.0, 50.0, 75.0]));
        assert_eq!(*clears.lock(), 1);
        assert_eq!(e.cursor(), 0);
        assert_eq!(e.current_time(), 0.0);
    }
}
