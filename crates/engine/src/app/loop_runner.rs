use std::env;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::content::{compile_def_database, ContentCompileError, DefDatabase};
use crate::{AppPaths, StartupError};

use super::metrics::MetricsAccumulator;
use super::scene::SceneMachine;
use super::{InputSnapshot, MetricsHandle, Scene, SceneCommand, SceneKey};

pub const SLOW_FRAME_ENV_VAR: &str = "SKYRELIC_SLOW_FRAME_MS";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockMode {
    /// Wall clock; frames are paced to `target_tps` with sleeps.
    Realtime,
    /// Every frame advances loop time by exactly `frame_dt`; never sleeps.
    Simulated { frame_dt: Duration },
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub interval_period: Duration,
    pub clock: ClockMode,
    pub max_session_duration: Option<Duration>,
    pub simulated_slow_frame_ms: u64,
    pub start_scene: SceneKey,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            interval_period: Duration::from_secs(1),
            clock: ClockMode::Realtime,
            max_session_duration: None,
            simulated_slow_frame_ms: 0,
            start_scene: SceneKey::A,
        }
    }
}

/// Live held-key state, sampled once per simulation tick.
pub trait InputSource {
    fn snapshot_for_tick(&mut self, loop_time: Duration) -> InputSnapshot;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    QuitRequested,
    SceneExit,
    SessionLimit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub stop_reason: StopReason,
    pub final_scene: SceneKey,
    pub loop_time: Duration,
    pub frames: u64,
    pub ticks: u64,
    pub interval_fires: u64,
    pub final_title: Option<String>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to compile level definitions: {0}")]
    Content(#[from] ContentCompileError),
}

pub fn run_app(
    config: LoopConfig,
    scene_a: Box<dyn Scene>,
    scene_b: Box<dyn Scene>,
    input: &mut dyn InputSource,
    metrics_handle: &MetricsHandle,
) -> Result<RunSummary, AppError> {
    let app_paths = AppPaths::resolve()?;
    info!(
        root = %app_paths.root.display(),
        base_content_dir = %app_paths.base_content_dir.display(),
        "startup"
    );
    let defs = compile_def_database(&app_paths)?;
    info!(level_defs = defs.level_defs().len(), "content_loaded");
    Ok(run_loop(
        config,
        scene_a,
        scene_b,
        defs,
        input,
        metrics_handle,
    ))
}

/// Drives the two-slot scene machine until quit, scene exit or the session
/// limit. Ticks run at a fixed rate; the interval callback fires on its own
/// cadence from raw frame time.
pub fn run_loop(
    config: LoopConfig,
    scene_a: Box<dyn Scene>,
    scene_b: Box<dyn Scene>,
    defs: DefDatabase,
    input: &mut dyn InputSource,
    metrics_handle: &MetricsHandle,
) -> RunSummary {
    let mut scenes = SceneMachine::new(scene_a, scene_b, config.start_scene, defs);

    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let interval_period =
        normalize_non_zero_duration(config.interval_period, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();
    let slow_frame_delay = match config.clock {
        ClockMode::Realtime => resolve_slow_frame_delay(config.simulated_slow_frame_ms),
        ClockMode::Simulated { .. } => Duration::ZERO,
    };

    scenes.load_active();
    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        interval_period_ms = interval_period.as_millis() as u64,
        clock = ?config.clock,
        scene = ?scenes.active_scene(),
        "loop_config"
    );

    let mut clock = FrameClock::new(config.clock, fixed_dt);
    let mut interval_timer = IntervalTimer::new(interval_period);
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut accumulator = Duration::ZERO;
    let mut loop_time = Duration::ZERO;
    let mut frames = 0u64;
    let mut ticks = 0u64;
    let mut interval_fires = 0u64;

    let stop_reason = 'frames: loop {
        if slow_frame_delay > Duration::ZERO {
            // Explicit debug perturbation only; this is not frame pacing.
            thread::sleep(slow_frame_delay);
        }

        let raw_frame_dt = clock.next_frame_delta();
        loop_time = loop_time.saturating_add(raw_frame_dt);
        accumulator = accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            let input_snapshot = input.snapshot_for_tick(loop_time);
            if input_snapshot.quit_requested() {
                info!(reason = "quit_input", "shutdown_requested");
                break 'frames StopReason::QuitRequested;
            }
            let command = scenes.update_active(fixed_dt_seconds, &input_snapshot);
            ticks = ticks.saturating_add(1);
            metrics_accumulator.record_tick();
            if let Some(reason) = apply_scene_command(&mut scenes, command) {
                break 'frames reason;
            }
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        for _ in 0..interval_timer.advance(raw_frame_dt) {
            let command = scenes.interval_active();
            interval_fires = interval_fires.saturating_add(1);
            metrics_accumulator.record_interval();
            if let Some(reason) = apply_scene_command(&mut scenes, command) {
                break 'frames reason;
            }
        }

        scenes.present_active();
        frames = frames.saturating_add(1);
        metrics_accumulator.record_frame(raw_frame_dt);
        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(loop_time) {
            metrics_handle.publish(snapshot);
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                interval_fires = snapshot.interval_fires,
                scene = ?scenes.active_scene(),
                "loop_metrics"
            );
        }

        if config
            .max_session_duration
            .is_some_and(|limit| loop_time >= limit)
        {
            info!(
                loop_time_ms = loop_time.as_millis() as u64,
                "session_limit_reached"
            );
            break StopReason::SessionLimit;
        }
    };

    let final_title = scenes.debug_title_active();
    let final_scene = scenes.active_scene();
    scenes.shutdown_all();
    info!(
        stop_reason = ?stop_reason,
        frames,
        ticks,
        interval_fires,
        loop_time_ms = loop_time.as_millis() as u64,
        "shutdown"
    );

    RunSummary {
        stop_reason,
        final_scene,
        loop_time,
        frames,
        ticks,
        interval_fires,
        final_title,
    }
}

fn apply_scene_command(scenes: &mut SceneMachine, command: SceneCommand) -> Option<StopReason> {
    match command {
        SceneCommand::None => None,
        SceneCommand::SwitchTo(next_scene) => {
            scenes.switch_to(next_scene);
            None
        }
        SceneCommand::HardResetTo(next_scene) => {
            scenes.hard_reset_to(next_scene);
            None
        }
        SceneCommand::Exit => {
            info!(reason = "scene_exit", "shutdown_requested");
            Some(StopReason::SceneExit)
        }
    }
}

struct FrameClock {
    mode: ClockMode,
    frame_target: Duration,
    last_frame_instant: Instant,
    started: bool,
}

impl FrameClock {
    fn new(mode: ClockMode, frame_target: Duration) -> Self {
        Self {
            mode,
            frame_target,
            last_frame_instant: Instant::now(),
            started: false,
        }
    }

    fn next_frame_delta(&mut self) -> Duration {
        match self.mode {
            ClockMode::Simulated { frame_dt } => frame_dt,
            ClockMode::Realtime => {
                if self.started {
                    let elapsed = Instant::now().saturating_duration_since(self.last_frame_instant);
                    let cap_sleep = compute_cap_sleep(elapsed, Some(self.frame_target));
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }
                }
                self.started = true;
                let now = Instant::now();
                let raw = now.saturating_duration_since(self.last_frame_instant);
                self.last_frame_instant = now;
                raw
            }
        }
    }
}

/// Fixed-cadence timer fed with raw frame time; fires once per elapsed period.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IntervalTimer {
    period: Duration,
    elapsed: Duration,
}

impl IntervalTimer {
    pub(crate) fn new(period: Duration) -> Self {
        Self {
            period: normalize_non_zero_duration(period, Duration::from_secs(1)),
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn advance(&mut self, frame_dt: Duration) -> u32 {
        self.elapsed = self.elapsed.saturating_add(frame_dt);
        let mut fires = 0u32;
        while self.elapsed >= self.period {
            self.elapsed -= self.period;
            fires = fires.saturating_add(1);
        }
        fires
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;
    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(value) => match value.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    env_var = SLOW_FRAME_ENV_VAR,
                    value = value.as_str(),
                    "invalid slow-frame env var value; falling back to config"
                );
                Duration::from_millis(config_slow_frame_ms)
            }
        },
        Err(env::VarError::NotPresent) => Duration::from_millis(config_slow_frame_ms),
        Err(err) => {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                error = %err,
                "unable to read slow-frame env var; falling back to config"
            );
            Duration::from_millis(config_slow_frame_ms)
        }
    }
}
