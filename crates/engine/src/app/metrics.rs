use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    /// Interval callbacks fired during the window; ~1 per second at the default period.
    pub interval_fires: u32,
}

/// Shared read side of the loop metrics, cloneable into presenters or tools.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                *poisoned.into_inner() = snapshot;
            }
        }
    }
}

/// Windowed counters keyed on loop time rather than wall time, so simulated
/// clocks report the rates the simulation actually saw.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    window_start: Duration,
    window: Duration,
    frames: u32,
    ticks: u32,
    interval_fires: u32,
    frame_time_sum: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window_start: Duration::ZERO,
            window,
            frames: 0,
            ticks: 0,
            interval_fires: 0,
            frame_time_sum: Duration::ZERO,
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration) {
        self.frames = self.frames.saturating_add(1);
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
    }

    pub(crate) fn record_tick(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
    }

    pub(crate) fn record_interval(&mut self) {
        self.interval_fires = self.interval_fires.saturating_add(1);
    }

    pub(crate) fn maybe_snapshot(&mut self, loop_time: Duration) -> Option<LoopMetricsSnapshot> {
        let elapsed = loop_time.saturating_sub(self.window_start);
        if elapsed < self.window {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = if self.frames == 0 {
            0.0
        } else {
            (self.frame_time_sum.as_secs_f32() / self.frames as f32) * 1000.0
        };

        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            tps: self.ticks as f32 / elapsed_seconds,
            frame_time_ms,
            interval_fires: self.interval_fires,
        };

        self.window_start = loop_time;
        self.frames = 0;
        self.ticks = 0;
        self.interval_fires = 0;
        self.frame_time_sum = Duration::ZERO;

        Some(snapshot)
    }
}
