use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelDefId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageModel {
    /// `rate_per_second * dt` for every contacting enemy, every frame.
    Continuous { rate_per_second: f32 },
    /// A fixed hit, then contacts are ignored until the cooldown runs out.
    Cooldown { amount: f32, cooldown_seconds: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompletionRule {
    /// Collecting every fragment spawns `count` chests; the first one wins.
    SpawnChests { count: u32, reach_radius: f32 },
    /// Collecting every fragment wins outright.
    Immediate,
}

/// Tuning for one forest level. Distances are world units on the ground plane.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelTuning {
    pub world_half_extent: f32,
    pub spawn_half_extent: f32,
    pub time_limit_seconds: u32,
    pub player_speed: f32,
    pub player_radius: f32,
    pub tree_count: u32,
    pub tree_radius: f32,
    pub spawn_clearing: f32,
    pub fragment_count: u32,
    pub pickup_radius: f32,
    pub guard_count: u32,
    pub guard_offset: f32,
    pub enemy_count: u32,
    pub chase_speed: f32,
    pub detection_range: f32,
    pub wander_speed: f32,
    pub wander_turn_interval_seconds: f32,
    pub wander_turn_max_radians: f32,
    pub contact_radius: f32,
    pub damage: DamageModel,
    pub completion: CompletionRule,
    pub reward_points_min: u32,
    pub reward_points_max: u32,
}

impl Default for LevelTuning {
    fn default() -> Self {
        Self {
            world_half_extent: 60.0,
            spawn_half_extent: 30.0,
            time_limit_seconds: 120,
            player_speed: 6.0,
            player_radius: 0.4,
            tree_count: 120,
            tree_radius: 1.0,
            spawn_clearing: 5.0,
            fragment_count: 5,
            pickup_radius: 1.3,
            guard_count: 2,
            guard_offset: 1.8,
            enemy_count: 6,
            chase_speed: 3.8,
            detection_range: 13.0,
            wander_speed: 1.2,
            wander_turn_interval_seconds: 1.2,
            wander_turn_max_radians: 0.5,
            contact_radius: 1.3,
            damage: DamageModel::Continuous {
                rate_per_second: 20.0,
            },
            completion: CompletionRule::SpawnChests {
                count: 2,
                reach_radius: 1.4,
            },
            reward_points_min: 100,
            reward_points_max: 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelArchetype {
    pub id: LevelDefId,
    pub def_name: String,
    pub label: String,
    pub tuning: LevelTuning,
}

#[derive(Debug, Default, Clone)]
pub struct DefDatabase {
    level_defs: Vec<LevelArchetype>,
    level_ids_by_name: HashMap<String, LevelDefId>,
}

impl DefDatabase {
    /// Ids follow the order of `level_defs`; callers sort first for stable ids.
    pub fn from_level_defs(mut level_defs: Vec<LevelArchetype>) -> Self {
        let mut level_ids_by_name = HashMap::with_capacity(level_defs.len());
        for (idx, def) in level_defs.iter_mut().enumerate() {
            let id = LevelDefId(idx as u32);
            def.id = id;
            level_ids_by_name.insert(def.def_name.clone(), id);
        }
        Self {
            level_defs,
            level_ids_by_name,
        }
    }

    pub fn level_def_id_by_name(&self, name: &str) -> Option<LevelDefId> {
        self.level_ids_by_name.get(name).copied()
    }

    pub fn level_def(&self, id: LevelDefId) -> Option<&LevelArchetype> {
        self.level_defs.get(id.0 as usize)
    }

    pub fn level_def_by_name(&self, name: &str) -> Option<&LevelArchetype> {
        self.level_def_id_by_name(name)
            .and_then(|id| self.level_def(id))
    }

    pub fn level_defs(&self) -> &[LevelArchetype] {
        &self.level_defs
    }
}
