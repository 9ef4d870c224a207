//! Time sources
//!
//! The recorder and playback engine read "now" through [`Clock`] so that a
//! host can drive them from the system clock and tests can drive them by hand.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Monotonic millisecond time source
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary, fixed origin
    fn now_ms(&self) -> f64;
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock following tokio's time
///
/// Advances with `tokio::time::pause` / `advance` in tests.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-driven clock
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the component under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(start_ms)),
        }
    }

    pub fn set(&self, ms: f64) {
        *self.now.lock() = ms;
    }

    pub fn advance(&self, ms: f64) {
        *self.now.lock() += ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        *self.now.lock()
    }
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;
