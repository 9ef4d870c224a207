//! Display and timer loops
//!
//! Runs a source on a tokio task with two clocks: a display-refresh interval
//! that drives detection or playback, and a slower fixed interval that
//! refreshes positions and pushes a state snapshot whenever the state has
//! moved, including stops the source makes on its own. Control events arrive on a
//! channel and are handled on the same task, so the source is never touched
//! from two places at once. A detector call is awaited inside the display
//! tick; ticks that fall due meanwhile are skipped rather than queued.

use super::session::CaptureSession;
use super::traits::{DetectorAdapter, MediaSource};
use crate::control::{ControlEvent, ControlStateMachine, ControlTarget};
use crate::playback::{PlaybackEngine, PosePlayer};
use crate::utils::error::{AppError, AppResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// A source that can be driven by the display and timer clocks
#[async_trait]
pub trait Driven: ControlTarget + Send {
    /// Work for one display refresh
    async fn display_tick(&mut self);

    /// Work for one fixed-interval tick
    fn timer_tick(&mut self) {}
}

#[async_trait]
impl<M: MediaSource, D: DetectorAdapter> Driven for CaptureSession<M, D> {
    async fn display_tick(&mut self) {
        self.pose_detection_frame().await;
    }

    fn timer_tick(&mut self) {
        self.on_timer_update();
    }
}

#[async_trait]
impl Driven for PosePlayer {
    async fn display_tick(&mut self) {
        self.on_display_frame();
    }
}

#[async_trait]
impl Driven for PlaybackEngine {
    async fn display_tick(&mut self) {
        self.on_display_frame();
    }
}

/// Loop timing
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    /// Display refresh period
    pub display_interval: Duration,

    /// State snapshot period
    pub timer_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            display_interval: Duration::from_micros(16_667),
            timer_interval: Duration::from_millis(100),
        }
    }
}

impl DriverConfig {
    /// Display refresh at `fps` frames per second
    pub fn with_fps(fps: u32) -> Self {
        Self {
            display_interval: Duration::from_secs_f64(1.0 / f64::from(fps.max(1))),
            ..Default::default()
        }
    }
}

/// Handle to a running driver task
pub struct DriverHandle<T: Driven + 'static> {
    stop_flag: Arc<AtomicBool>,
    control_tx: mpsc::Sender<ControlEvent>,
    task: JoinHandle<ControlStateMachine<T>>,
}

impl<T: Driven + 'static> DriverHandle<T> {
    /// Queue a control event for the source
    pub async fn dispatch(&self, event: ControlEvent) -> AppResult<()> {
        self.control_tx
            .send(event)
            .await
            .map_err(|_| AppError::Driver("driver has stopped".to_string()))
    }

    /// Signal the loops to stop
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    /// Stop and take the state machine back
    pub async fn join(self) -> AppResult<ControlStateMachine<T>> {
        self.stop();
        self.task
            .await
            .map_err(|e| AppError::Driver(format!("driver task failed: {}", e)))
    }
}

/// Spawn the loops for `machine` on the current tokio runtime
pub fn spawn<T: Driven + 'static>(
    mut machine: ControlStateMachine<T>,
    config: DriverConfig,
) -> DriverHandle<T> {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let (control_tx, mut control_rx) = mpsc::channel::<ControlEvent>(32);

    let stop = stop_flag.clone();
    let task = tokio::spawn(async move {
        tracing::debug!("Driver started");

        let mut display = interval(config.display_interval);
        display.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timer = interval(config.timer_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if stop.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                _ = display.tick() => {
                    machine.target_mut().display_tick().await;
                }
                _ = timer.tick() => {
                    machine.target_mut().timer_tick();
                    machine.publish_if_changed();
                }
                event = control_rx.recv() => match event {
                    Some(event) => {
                        machine.dispatch(event);
                    }
                    None => break,
                },
            }
        }

        tracing::debug!("Driver stopped");
        machine
    });

    DriverHandle {
        stop_flag,
        control_tx,
        task,
    }
}
