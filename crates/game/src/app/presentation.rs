use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info, trace};

use super::flight::{FlightEvent, FlightSnapshot, MissionStatus};
use super::forest::{LevelEvent, LevelSnapshot};

/// Applies simulation state updates to whatever is showing the game.
pub(crate) trait Presenter<E> {
    fn apply(&mut self, event: &E);
}

const CHEST_BOB_BASE: f32 = 1.0;
const CHEST_BOB_AMPLITUDE: f32 = 0.25;
const CHEST_BOB_RATE: f32 = 2.0;

/// Height of a spawned chest's idle bob. Never feeds back into collision.
pub(crate) fn chest_bob_height(elapsed_seconds: f32, float_offset: f32) -> f32 {
    CHEST_BOB_BASE + (elapsed_seconds * CHEST_BOB_RATE + float_offset).sin() * CHEST_BOB_AMPLITUDE
}

/// Headless presenter: HUD and overlay changes become log lines.
pub(crate) struct TracingPresenter {
    scene_label: String,
}

impl TracingPresenter {
    pub(crate) fn new(scene_label: &str) -> Self {
        Self {
            scene_label: scene_label.to_string(),
        }
    }
}

impl Presenter<LevelEvent> for TracingPresenter {
    fn apply(&mut self, event: &LevelEvent) {
        let scene = self.scene_label.as_str();
        match event {
            LevelEvent::ActorSpawned { id, kind, position } => {
                trace!(
                    scene,
                    actor = id.0,
                    kind = kind.as_token(),
                    x = position.x,
                    y = position.y,
                    "actor_spawned"
                );
            }
            LevelEvent::ActorMoved {
                id,
                position,
                facing,
            } => {
                trace!(
                    scene,
                    actor = id.0,
                    x = position.x,
                    y = position.y,
                    facing = ?facing,
                    "actor_moved"
                );
            }
            LevelEvent::VisibilityChanged { id, visible } => {
                debug!(scene, actor = id.0, visible, "actor_visibility");
            }
            LevelEvent::HudChanged {
                health_pct,
                fragments_pct,
                time_pct,
            } => {
                debug!(scene, health_pct, fragments_pct, time_pct, "hud");
            }
            LevelEvent::Notification(text) => info!(scene, text = %text, "notification"),
            LevelEvent::ChestBobbed { id, height } => {
                trace!(scene, actor = id.0, height, "chest_bob");
            }
            LevelEvent::ChestsSpawned { count } => info!(scene, count, "chests_spawned"),
            LevelEvent::MissionEnded(outcome) => {
                info!(
                    scene,
                    success = outcome.success,
                    title = outcome.title,
                    message = outcome.message,
                    points = %outcome.points_text(),
                    "overlay"
                );
            }
        }
    }
}

impl Presenter<FlightEvent> for TracingPresenter {
    fn apply(&mut self, event: &FlightEvent) {
        let scene = self.scene_label.as_str();
        match event {
            FlightEvent::DestinationSelected(quote) => {
                info!(
                    scene,
                    destination = %quote.to,
                    distance = %format!("{:.0} KM", quote.distance_km),
                    cost = %format!("{} UNIT", quote.energy_cost),
                    weather = quote.weather_description.as_deref().unwrap_or("unknown"),
                    "destination_selected"
                );
            }
            FlightEvent::FlightStarted { from, to } => {
                info!(scene, from = %from, to = %to, "in_flight");
            }
            FlightEvent::PlaneMoved {
                position,
                heading_deg,
                progress,
            } => {
                trace!(
                    scene,
                    lat = position.lat_deg,
                    lon = position.lon_deg,
                    heading_deg,
                    progress,
                    "plane_moved"
                );
            }
            FlightEvent::Arrived {
                airport,
                energy,
                score,
            } => {
                info!(scene, airport = %airport, energy = %format!("{energy}%"), score, "hud");
            }
            FlightEvent::Log(text) => info!(scene, text = %text, "flight_log"),
            FlightEvent::MissionComplete { score } => {
                info!(scene, score, "mission_success_screen");
            }
            FlightEvent::MissionFailed { reason } => {
                info!(scene, reason = %reason, "mission_failed_screen");
            }
        }
    }
}

/// One finished mission, as written to the end-of-run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub(crate) enum MissionRecord {
    Forest(LevelSnapshot),
    Flight(FlightSnapshot),
}

impl MissionRecord {
    pub(crate) fn succeeded(&self) -> bool {
        match self {
            Self::Forest(level) => level.outcome.as_ref().is_some_and(|outcome| outcome.success),
            Self::Flight(flight) => flight.mission == MissionStatus::Complete,
        }
    }
}

/// Shared between the scenes and the runner; scenes append, the runner reads
/// after the loop returns.
#[derive(Debug, Clone, Default)]
pub(crate) struct MissionLog {
    records: Rc<RefCell<Vec<MissionRecord>>>,
}

impl MissionLog {
    pub(crate) fn record(&self, record: MissionRecord) {
        self.records.borrow_mut().push(record);
    }

    pub(crate) fn records(&self) -> Vec<MissionRecord> {
        self.records.borrow().clone()
    }
}
