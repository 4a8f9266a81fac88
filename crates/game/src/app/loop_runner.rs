use std::path::Path;
use std::process::ExitCode;

use relic_engine::{run_app, write_json_atomic, MetricsHandle, RunSummary, SceneKey, StopReason};
use serde::Serialize;
use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::presentation::MissionRecord;

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    stop_reason: &'static str,
    final_scene: &'static str,
    loop_time_seconds: f64,
    frames: u64,
    ticks: u64,
    interval_fires: u64,
    final_title: Option<&'a str>,
    missions: &'a [MissionRecord],
}

impl<'a> RunReport<'a> {
    fn new(summary: &'a RunSummary, missions: &'a [MissionRecord]) -> Self {
        Self {
            stop_reason: match summary.stop_reason {
                StopReason::QuitRequested => "quit_requested",
                StopReason::SceneExit => "scene_exit",
                StopReason::SessionLimit => "session_limit",
            },
            final_scene: match summary.final_scene {
                SceneKey::A => "a",
                SceneKey::B => "b",
            },
            loop_time_seconds: summary.loop_time.as_secs_f64(),
            frames: summary.frames,
            ticks: summary.ticks,
            interval_fires: summary.interval_fires,
            final_title: summary.final_title.as_deref(),
            missions,
        }
    }
}

pub(crate) fn run(mut app: AppWiring) -> ExitCode {
    let metrics = MetricsHandle::default();
    let summary = match run_app(
        app.config,
        app.scene_a,
        app.scene_b,
        app.input.as_mut(),
        &metrics,
    ) {
        Ok(summary) => summary,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    let missions = app.mission_log.records();
    info!(
        stop_reason = ?summary.stop_reason,
        missions = missions.len(),
        succeeded = missions.iter().filter(|mission| mission.succeeded()).count(),
        final_title = summary.final_title.as_deref().unwrap_or(""),
        "run_finished"
    );

    if let Some(path) = app.report_path.as_deref() {
        if let Err(exit) = write_report(path, &summary, &missions) {
            return exit;
        }
    }
    ExitCode::SUCCESS
}

fn write_report(
    path: &Path,
    summary: &RunSummary,
    missions: &[MissionRecord],
) -> Result<(), ExitCode> {
    let report = RunReport::new(summary, missions);
    match write_json_atomic(path, &report) {
        Ok(()) => {
            info!(path = %path.display(), "report_written");
            Ok(())
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "report_write_failed");
            Err(ExitCode::FAILURE)
        }
    }
}
