mod input;
mod loop_runner;
mod metrics;
mod scene;

pub use input::{ActionStates, InputAction};
pub use loop_runner::{
    run_app, run_loop, AppError, ClockMode, InputSource, LoopConfig, RunSummary, StopReason,
    SLOW_FRAME_ENV_VAR,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scene::{InputSnapshot, Scene, SceneCommand, SceneKey, Transform, Vec2};
