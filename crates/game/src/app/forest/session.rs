use std::f32::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use relic_engine::{CompletionRule, InputSnapshot, LevelArchetype, LevelTuning, Transform, Vec2};
use tracing::{debug, info, trace};

use super::damage::{policy_for, DamagePolicy};
use super::events::{LevelEvent, LevelEventBus};
use super::spawn::{random_layout, random_point, LevelLayout};
use super::systems::{
    contacting_enemy_count, step_enemy, step_player, ForestSystemId, FOREST_SYSTEM_ORDER,
};
use super::types::{
    Actor, ActorId, ActorKind, AiState, Chest, EndCause, EnemyAgent, Fragment, LevelHud,
    LevelSnapshot, MissionOutcome, MissionState, Obstacle, MAX_HEALTH,
};

pub(crate) const ALL_FRAGMENTS_NOTIFICATION: &str = "All fragments collected!";

/// One playthrough of a forest level. Owns every actor, the HUD scalars and
/// the end state; nothing outside it mutates them.
pub(crate) struct LevelSession {
    def_name: String,
    label: String,
    seed: u64,
    tuning: LevelTuning,
    rng: StdRng,
    next_actor_id: u32,
    player: Actor,
    enemies: Vec<EnemyAgent>,
    fragments: Vec<Fragment>,
    obstacles: Vec<Obstacle>,
    chests: Vec<Chest>,
    hud: LevelHud,
    last_published_hud: Option<LevelHud>,
    state: MissionState,
    damage: Box<dyn DamagePolicy>,
    events: LevelEventBus,
    elapsed_seconds: f32,
}

impl LevelSession {
    pub(crate) fn new(archetype: &LevelArchetype, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let layout = random_layout(&archetype.tuning, &mut rng);
        Self::with_layout(archetype, seed, rng, layout)
    }

    #[cfg(test)]
    pub(crate) fn from_layout(archetype: &LevelArchetype, seed: u64, layout: LevelLayout) -> Self {
        Self::with_layout(archetype, seed, StdRng::seed_from_u64(seed), layout)
    }

    fn with_layout(
        archetype: &LevelArchetype,
        seed: u64,
        rng: StdRng,
        layout: LevelLayout,
    ) -> Self {
        let tuning = archetype.tuning.clone();
        let fragments_total = layout.fragments.len() as u32;
        let mut session = Self {
            def_name: archetype.def_name.clone(),
            label: archetype.label.clone(),
            seed,
            damage: policy_for(tuning.damage),
            hud: LevelHud::new(fragments_total, tuning.time_limit_seconds),
            tuning,
            rng,
            next_actor_id: 0,
            player: Actor {
                id: ActorId(0),
                kind: ActorKind::Player,
                transform: Transform::at(layout.player),
            },
            enemies: Vec::with_capacity(layout.enemies.len()),
            fragments: Vec::with_capacity(layout.fragments.len()),
            obstacles: Vec::with_capacity(layout.obstacles.len()),
            chests: Vec::new(),
            last_published_hud: None,
            state: MissionState::Running,
            events: LevelEventBus::default(),
            elapsed_seconds: 0.0,
        };

        session.player.id = session.spawn_actor(ActorKind::Player, layout.player);
        for position in layout.obstacles {
            let id = session.spawn_actor(ActorKind::Obstacle, position);
            session.obstacles.push(Obstacle {
                id,
                position,
                radius: session.tuning.tree_radius,
            });
        }
        for position in layout.fragments {
            let id = session.spawn_actor(ActorKind::Fragment, position);
            session.fragments.push(Fragment {
                id,
                position,
                consumed: false,
            });
        }
        for spawn in layout.enemies {
            let id = session.spawn_actor(spawn.kind, spawn.position);
            session.enemies.push(EnemyAgent {
                actor: Actor {
                    id,
                    kind: spawn.kind,
                    transform: Transform::at(spawn.position),
                },
                state: AiState::Wander,
                wander_heading: spawn.heading,
                wander_timer: 0.0,
            });
        }
        session.publish_hud_if_changed();

        info!(
            def_name = %session.def_name,
            seed,
            trees = session.obstacles.len(),
            fragments = session.fragments.len(),
            enemies = session.enemies.len(),
            damage_policy = session.damage.name(),
            "level_session_started"
        );
        session
    }

    fn spawn_actor(&mut self, kind: ActorKind, position: Vec2) -> ActorId {
        let id = ActorId(self.next_actor_id);
        self.next_actor_id = self.next_actor_id.saturating_add(1);
        self.events
            .emit(LevelEvent::ActorSpawned { id, kind, position });
        id
    }

    /// Advances the level by one frame. A no-op once the mission has ended.
    pub(crate) fn frame_update(&mut self, dt_seconds: f32, input: &InputSnapshot) {
        if self.state.is_ended() {
            return;
        }
        let dt_seconds = if dt_seconds.is_finite() {
            dt_seconds.max(0.0)
        } else {
            0.0
        };
        self.elapsed_seconds += dt_seconds;
        self.damage.begin_frame(dt_seconds);

        for system_id in FOREST_SYSTEM_ORDER {
            if self.state.is_ended() {
                break;
            }
            self.run_system(system_id, dt_seconds, input);
        }
        self.publish_hud_if_changed();
    }

    fn run_system(&mut self, system_id: ForestSystemId, dt_seconds: f32, input: &InputSnapshot) {
        trace!(system = system_id.name(), dt_seconds, "forest_system");
        match system_id {
            ForestSystemId::Locomotion => {
                if step_player(
                    &mut self.player,
                    input,
                    &self.tuning,
                    &self.obstacles,
                    dt_seconds,
                ) {
                    self.events.emit(LevelEvent::ActorMoved {
                        id: self.player.id,
                        position: self.player.position(),
                        facing: self.player.transform.rotation_radians,
                    });
                }
            }
            ForestSystemId::Contact => {
                let contacts = contacting_enemy_count(
                    &self.enemies,
                    self.player.position(),
                    self.tuning.contact_radius,
                );
                for _ in 0..contacts {
                    let amount = self.damage.on_contact(dt_seconds);
                    self.apply_damage(amount);
                }
            }
            ForestSystemId::EnemyAi => {
                let player = self.player.position();
                for agent in &mut self.enemies {
                    let before = agent.actor.transform;
                    step_enemy(agent, player, &self.tuning, dt_seconds, &mut self.rng);
                    if agent.actor.transform != before {
                        self.events.emit(LevelEvent::ActorMoved {
                            id: agent.actor.id,
                            position: agent.actor.position(),
                            facing: agent.actor.transform.rotation_radians,
                        });
                    }
                }
            }
            ForestSystemId::Pickup => self.collect_fragments(),
            ForestSystemId::Chest => self.open_chests(),
        }
    }

    /// Decrements the countdown by one second. A no-op once ended.
    pub(crate) fn countdown_tick(&mut self) {
        if self.state.is_ended() {
            return;
        }
        self.hud.time_left_seconds = self.hud.time_left_seconds.saturating_sub(1);
        self.publish_hud_if_changed();
        if self.hud.time_left_seconds == 0 {
            self.end_mission(false, EndCause::TimeExpired);
        }
    }

    /// Subtracts health, clamped to `[0, MAX_HEALTH]`. Reaching zero fails the
    /// mission; later calls change nothing.
    pub(crate) fn apply_damage(&mut self, amount: f32) {
        if self.state.is_ended() || amount <= 0.0 || !amount.is_finite() {
            return;
        }
        self.hud.health = (self.hud.health - amount).clamp(0.0, MAX_HEALTH);
        if self.hud.health <= 0.0 {
            self.end_mission(false, EndCause::HealthDepleted);
        }
    }

    fn collect_fragments(&mut self) {
        let player = self.player.position();
        let total = self.hud.fragments_total;
        for index in 0..self.fragments.len() {
            let fragment = &mut self.fragments[index];
            if fragment.consumed || fragment.position.distance(player) >= self.tuning.pickup_radius
            {
                continue;
            }
            fragment.consumed = true;
            let id = fragment.id;
            self.hud.fragments_collected += 1;
            let collected = self.hud.fragments_collected;
            debug!(fragment = id.0, collected, total, "fragment_collected");
            self.events
                .emit(LevelEvent::VisibilityChanged { id, visible: false });
            let progress = format!("Fragment {collected}/{total}");
            self.events.emit(LevelEvent::Notification(progress));

            if collected == total {
                let notice = ALL_FRAGMENTS_NOTIFICATION.to_string();
                self.events.emit(LevelEvent::Notification(notice));
                self.complete_fragments();
                if self.state.is_ended() {
                    return;
                }
            }
        }
    }

    fn complete_fragments(&mut self) {
        match self.tuning.completion {
            CompletionRule::SpawnChests { count, .. } => self.spawn_chests(count),
            CompletionRule::Immediate => self.end_mission(true, EndCause::FragmentsCollected),
        }
    }

    fn spawn_chests(&mut self, count: u32) {
        for index in 0..count {
            let position = random_point(&mut self.rng, self.tuning.spawn_half_extent);
            let float_offset = self.rng.gen_range(0.0..TAU);
            let id = self.spawn_actor(ActorKind::Chest, position);
            self.chests.push(Chest {
                id,
                position,
                opened: false,
                is_winning: index == 0,
                float_offset,
            });
        }
        info!(def_name = %self.def_name, count, "chests_spawned");
        self.events.emit(LevelEvent::ChestsSpawned { count });
    }

    fn open_chests(&mut self) {
        let CompletionRule::SpawnChests { reach_radius, .. } = self.tuning.completion else {
            return;
        };
        let player = self.player.position();
        let reached = self
            .chests
            .iter_mut()
            .find(|chest| chest.is_openable_from(player, reach_radius));
        let Some(chest) = reached else {
            return;
        };
        chest.opened = true;
        let (id, is_winning) = (chest.id, chest.is_winning);
        self.events
            .emit(LevelEvent::VisibilityChanged { id, visible: false });
        let cause = if is_winning {
            EndCause::WinningChest
        } else {
            EndCause::DecoyChest
        };
        self.end_mission(is_winning, cause);
    }

    fn end_mission(&mut self, success: bool, cause: EndCause) {
        if self.state.is_ended() {
            return;
        }
        let (min, max) = (self.tuning.reward_points_min, self.tuning.reward_points_max);
        let points = if max > min {
            self.rng.gen_range(min..max)
        } else {
            min
        };
        let outcome = MissionOutcome::new(success, cause, points);
        info!(
            def_name = %self.def_name,
            success,
            cause = ?cause,
            points,
            health = self.hud.health,
            time_left = self.hud.time_left_seconds,
            "mission_ended"
        );
        self.state = MissionState::Ended(outcome.clone());
        self.publish_hud_if_changed();
        self.events.emit(LevelEvent::MissionEnded(outcome));
    }

    fn publish_hud_if_changed(&mut self) {
        if self.last_published_hud == Some(self.hud) {
            return;
        }
        self.last_published_hud = Some(self.hud);
        self.events.emit(LevelEvent::HudChanged {
            health_pct: self.hud.health_pct(),
            fragments_pct: self.hud.fragments_pct(),
            time_pct: self.hud.time_pct(),
        });
    }

    pub(crate) fn drain_events(&mut self) -> Vec<LevelEvent> {
        self.events.drain()
    }

    pub(crate) fn total_events_emitted(&self) -> u64 {
        self.events.total_emitted()
    }

    pub(crate) fn is_ended(&self) -> bool {
        self.state.is_ended()
    }

    pub(crate) fn outcome(&self) -> Option<&MissionOutcome> {
        match &self.state {
            MissionState::Running => None,
            MissionState::Ended(outcome) => Some(outcome),
        }
    }

    pub(crate) fn hud(&self) -> LevelHud {
        self.hud
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn elapsed_seconds(&self) -> f32 {
        self.elapsed_seconds
    }

    #[cfg(test)]
    pub(crate) fn player(&self) -> &Actor {
        &self.player
    }

    #[cfg(test)]
    pub(crate) fn enemies(&self) -> &[EnemyAgent] {
        &self.enemies
    }

    #[cfg(test)]
    pub(crate) fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub(crate) fn chests(&self) -> &[Chest] {
        &self.chests
    }

    #[cfg(test)]
    pub(crate) fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    #[cfg(test)]
    pub(crate) fn set_player_position(&mut self, position: Vec2) {
        self.player.transform.position = position;
    }

    pub(crate) fn snapshot(&self) -> LevelSnapshot {
        LevelSnapshot {
            def_name: self.def_name.clone(),
            label: self.label.clone(),
            seed: self.seed,
            elapsed_seconds: self.elapsed_seconds,
            player_position: self.player.position(),
            player_facing: self.player.transform.rotation_radians,
            health: self.hud.health,
            fragments_collected: self.hud.fragments_collected,
            fragments_total: self.hud.fragments_total,
            time_left_seconds: self.hud.time_left_seconds,
            enemies_chasing: self
                .enemies
                .iter()
                .filter(|agent| agent.state == AiState::Chase)
                .count() as u32,
            chests_spawned: self.chests.len() as u32,
            outcome: self.outcome().cloned(),
        }
    }
}
