use relic_engine::{Transform, Vec2};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub(crate) struct ActorId(pub(crate) u32);

/// Capability tag carried by every actor the presenter is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ActorKind {
    Player,
    Enemy,
    Guard,
    Fragment,
    Obstacle,
    Chest,
}

impl ActorKind {
    pub(crate) fn as_token(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Enemy => "enemy",
            Self::Guard => "guard",
            Self::Fragment => "fragment",
            Self::Obstacle => "obstacle",
            Self::Chest => "chest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Actor {
    pub(crate) id: ActorId,
    pub(crate) kind: ActorKind,
    pub(crate) transform: Transform,
}

impl Actor {
    pub(crate) fn position(&self) -> Vec2 {
        self.transform.position
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum AiState {
    Chase,
    Wander,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EnemyAgent {
    pub(crate) actor: Actor,
    pub(crate) state: AiState,
    pub(crate) wander_heading: f32,
    pub(crate) wander_timer: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Fragment {
    pub(crate) id: ActorId,
    pub(crate) position: Vec2,
    pub(crate) consumed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Obstacle {
    pub(crate) id: ActorId,
    pub(crate) position: Vec2,
    pub(crate) radius: f32,
}

impl Obstacle {
    pub(crate) fn overlaps(&self, point: Vec2, radius: f32) -> bool {
        point.distance(self.position) < self.radius + radius
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Chest {
    pub(crate) id: ActorId,
    pub(crate) position: Vec2,
    pub(crate) opened: bool,
    pub(crate) is_winning: bool,
    /// Phase for the idle bob; presentation only.
    pub(crate) float_offset: f32,
}

impl Chest {
    pub(crate) fn is_openable_from(&self, player: Vec2, reach_radius: f32) -> bool {
        !self.opened && self.position.distance(player) < reach_radius
    }
}

pub(crate) const SUCCESS_TITLE: &str = "MISSION ACCOMPLISHED";
pub(crate) const SUCCESS_MESSAGE: &str = "Relic Signal Triangulated Successfully.";
pub(crate) const FAILURE_TITLE: &str = "MISSION FAILED";
pub(crate) const FAILURE_MESSAGE: &str = "Pilot integrity compromised.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum EndCause {
    HealthDepleted,
    TimeExpired,
    WinningChest,
    DecoyChest,
    FragmentsCollected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct MissionOutcome {
    pub(crate) success: bool,
    pub(crate) cause: EndCause,
    pub(crate) title: &'static str,
    pub(crate) message: &'static str,
    pub(crate) points: u32,
}

impl MissionOutcome {
    pub(crate) fn new(success: bool, cause: EndCause, points: u32) -> Self {
        let (title, message) = if success {
            (SUCCESS_TITLE, SUCCESS_MESSAGE)
        } else {
            (FAILURE_TITLE, FAILURE_MESSAGE)
        };
        Self {
            success,
            cause,
            title,
            message,
            points,
        }
    }

    pub(crate) fn points_text(&self) -> String {
        format!("{} POINTS EARNED", self.points)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MissionState {
    Running,
    Ended(MissionOutcome),
}

impl MissionState {
    pub(crate) fn is_ended(&self) -> bool {
        matches!(self, Self::Ended(_))
    }
}

pub(crate) const MAX_HEALTH: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LevelHud {
    pub(crate) health: f32,
    pub(crate) fragments_collected: u32,
    pub(crate) fragments_total: u32,
    pub(crate) time_left_seconds: u32,
    pub(crate) time_limit_seconds: u32,
}

impl LevelHud {
    pub(crate) fn new(fragments_total: u32, time_limit_seconds: u32) -> Self {
        Self {
            health: MAX_HEALTH,
            fragments_collected: 0,
            fragments_total,
            time_left_seconds: time_limit_seconds,
            time_limit_seconds,
        }
    }

    pub(crate) fn health_pct(&self) -> f32 {
        self.health / MAX_HEALTH * 100.0
    }

    pub(crate) fn fragments_pct(&self) -> f32 {
        ratio_pct(self.fragments_collected, self.fragments_total)
    }

    pub(crate) fn time_pct(&self) -> f32 {
        ratio_pct(self.time_left_seconds, self.time_limit_seconds)
    }
}

fn ratio_pct(value: u32, total: u32) -> f32 {
    if total == 0 {
        return 0.0;
    }
    value as f32 / total as f32 * 100.0
}

/// Read-only view of a level, serialised into the end-of-run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct LevelSnapshot {
    pub(crate) def_name: String,
    pub(crate) label: String,
    pub(crate) seed: u64,
    pub(crate) elapsed_seconds: f32,
    pub(crate) player_position: Vec2,
    pub(crate) player_facing: Option<f32>,
    pub(crate) health: f32,
    pub(crate) fragments_collected: u32,
    pub(crate) fragments_total: u32,
    pub(crate) time_left_seconds: u32,
    pub(crate) enemies_chasing: u32,
    pub(crate) chests_spawned: u32,
    pub(crate) outcome: Option<MissionOutcome>,
}
