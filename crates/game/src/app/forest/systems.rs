use rand::Rng;
use relic_engine::{InputAction, InputSnapshot, LevelTuning, Vec2};
use tracing::trace;

use super::types::{Actor, AiState, EnemyAgent, Obstacle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ForestSystemId {
    Locomotion,
    Contact,
    EnemyAi,
    Pickup,
    Chest,
}

impl ForestSystemId {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Locomotion => "Locomotion",
            Self::Contact => "Contact",
            Self::EnemyAi => "EnemyAi",
            Self::Pickup => "Pickup",
            Self::Chest => "Chest",
        }
    }
}

/// Contact runs before enemy movement so damage uses the distance each enemy
/// had at the start of its update.
pub(crate) const FOREST_SYSTEM_ORDER: [ForestSystemId; 5] = [
    ForestSystemId::Locomotion,
    ForestSystemId::Contact,
    ForestSystemId::EnemyAi,
    ForestSystemId::Pickup,
    ForestSystemId::Chest,
];

/// Unit direction for the held keys; forward is `-y`.
pub(crate) fn movement_direction(input: &InputSnapshot) -> Vec2 {
    let mut dir = Vec2::ZERO;
    if input.is_down(InputAction::MoveForward) {
        dir.y -= 1.0;
    }
    if input.is_down(InputAction::MoveBack) {
        dir.y += 1.0;
    }
    if input.is_down(InputAction::MoveLeft) {
        dir.x -= 1.0;
    }
    if input.is_down(InputAction::MoveRight) {
        dir.x += 1.0;
    }
    dir.normalized_or_zero()
}

pub(crate) fn blocking_obstacle(
    position: Vec2,
    mover_radius: f32,
    obstacles: &[Obstacle],
) -> Option<&Obstacle> {
    obstacles
        .iter()
        .find(|obstacle| obstacle.overlaps(position, mover_radius))
}

/// Returns true when the player actually moved. A blocked move keeps both
/// position and facing.
pub(crate) fn step_player(
    player: &mut Actor,
    input: &InputSnapshot,
    tuning: &LevelTuning,
    obstacles: &[Obstacle],
    dt_seconds: f32,
) -> bool {
    let dir = movement_direction(input);
    if dir == Vec2::ZERO || dt_seconds <= 0.0 {
        return false;
    }

    let next = player.position() + dir * (tuning.player_speed * dt_seconds);
    if let Some(obstacle) = blocking_obstacle(next, tuning.player_radius, obstacles) {
        trace!(obstacle = obstacle.id.0, "player_blocked");
        return false;
    }
    player.transform.position = next;
    player.transform.rotation_radians = Some(dir.facing_radians());
    true
}

pub(crate) fn choose_ai_state(enemy: Vec2, player: Vec2, detection_range: f32) -> AiState {
    if enemy.distance(player) < detection_range {
        AiState::Chase
    } else {
        AiState::Wander
    }
}

/// Re-evaluates chase/wander from scratch and moves the agent one frame.
pub(crate) fn step_enemy(
    agent: &mut EnemyAgent,
    player: Vec2,
    tuning: &LevelTuning,
    dt_seconds: f32,
    rng: &mut impl Rng,
) {
    agent.state = choose_ai_state(agent.actor.position(), player, tuning.detection_range);
    match agent.state {
        AiState::Chase => {
            let to_player = player - agent.actor.position();
            let distance = to_player.length();
            let dir = to_player.normalized_or_zero();
            if dir == Vec2::ZERO {
                return;
            }
            let step = (tuning.chase_speed * dt_seconds).min(distance);
            agent.actor.transform.position += dir * step;
            agent.actor.transform.rotation_radians = Some(dir.facing_radians());
        }
        AiState::Wander => {
            agent.wander_timer += dt_seconds;
            if agent.wander_timer > tuning.wander_turn_interval_seconds {
                let max_turn = tuning.wander_turn_max_radians;
                if max_turn > 0.0 {
                    agent.wander_heading += rng.gen_range(-max_turn..max_turn);
                }
                agent.wander_timer = 0.0;
            }
            let speed = tuning.wander_speed * dt_seconds;
            agent.actor.transform.position += Vec2::from_facing(agent.wander_heading) * speed;
            agent.actor.transform.rotation_radians = Some(agent.wander_heading);
        }
    }
}

pub(crate) fn contacting_enemy_count(
    enemies: &[EnemyAgent],
    player: Vec2,
    contact_radius: f32,
) -> usize {
    enemies
        .iter()
        .map(|agent| agent.actor.position().distance(player))
        .filter(|distance| *distance < contact_radius)
        .count()
}
