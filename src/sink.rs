//! Visualization sinks
//!
//! A sink receives the keyframes to display plus the rectangle the media
//! occupies on screen. Sinks only consume; they never feed back into the
//! source.

use crate::pose::Keyframe;
use serde::{Deserialize, Serialize};

/// Display rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The unit rectangle, used when no display geometry is known
    pub fn unit() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// Visible media rectangle when media of `media_aspect` (width / height)
    /// is fitted inside a container, centred with letterbox borders.
    ///
    /// Returns `None` when the container has no area.
    pub fn letterbox(container_width: f64, container_height: f64, media_aspect: f64) -> Option<Self> {
        if container_width <= 0.0 || container_height <= 0.0 {
            return None;
        }
        if media_aspect <= 0.0 || !media_aspect.is_finite() {
            return Some(Self::new(0.0, 0.0, container_width, container_height));
        }

        let container_aspect = container_width / container_height;
        let bounds = if container_aspect < media_aspect {
            let height = container_width / media_aspect;
            Self::new(0.0, container_height / 2.0 - height / 2.0, container_width, height)
        } else if container_aspect > media_aspect {
            let width = container_height * media_aspect;
            Self::new(container_width / 2.0 - width / 2.0, 0.0, width, container_height)
        } else {
            Self::new(0.0, 0.0, container_width, container_height)
        };

        Some(bounds)
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0.0 {
            0.0
        } else {
            self.width / self.height
        }
    }
}

/// Consumer of keyframes for display
pub trait VisualizationSink: Send {
    /// Draw the given keyframes inside `bounds`
    fn draw(&mut self, keyframes: &[Keyframe], bounds: Bounds);

    /// Remove anything drawn
    fn clear(&mut self) {}
}

/// The sinks attached to one source
#[derive(Default)]
pub struct SinkSet {
    sinks: Vec<Box<dyn VisualizationSink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, sink: Box<dyn VisualizationSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn draw(&mut self, keyframes: &[Keyframe], bounds: Bounds) {
        for sink in &mut self.sinks {
            sink.draw(keyframes, bounds);
        }
    }

    pub fn clear(&mut self) {
        for sink in &mut self.sinks {
            sink.clear();
        }
    }
}

/// Sink that logs every redraw
#[derive(Debug, Default)]
pub struct LogSink {
    frames: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VisualizationSink for LogSink {
    fn draw(&mut self, keyframes: &[Keyframe], bounds: Bounds) {
        self.frames += 1;
        if let Some(first) = keyframes.first() {
            tracing::info!(
                "frame {} @ {:.0}ms: {} subject(s), {} points, display {:.0}x{:.0}",
                self.frames,
                first.time,
                keyframes.len(),
                first.points.len(),
                bounds.width,
                bounds.height
            );
        }
    }
}
