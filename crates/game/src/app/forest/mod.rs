mod damage;
mod events;
mod scene_impl;
mod session;
mod spawn;
mod systems;
mod types;

use relic_engine::{Scene, SceneKey};

pub(crate) use events::LevelEvent;
pub(crate) use scene_impl::SharedActionLatch;
use scene_impl::{ForestScene, ForestSceneConfig};
pub(crate) use types::LevelSnapshot;

use super::presentation::{MissionLog, TracingPresenter};

pub(crate) const LOST_FOREST_DEF: &str = "forest.lost";
pub(crate) const GUARDED_GROVE_DEF: &str = "forest.guarded";
const GUARDED_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Level def backing each scene slot of the forest pair.
pub(crate) fn def_name_for(key: SceneKey) -> &'static str {
    match key {
        SceneKey::A => LOST_FOREST_DEF,
        SceneKey::B => GUARDED_GROVE_DEF,
    }
}

/// One forest level in `slot`, playing the `variant` slot's level def.
pub(crate) fn build_level_scene(
    slot: SceneKey,
    variant: SceneKey,
    switch_target: Option<SceneKey>,
    seed: u64,
    latch: &SharedActionLatch,
    mission_log: &MissionLog,
) -> Box<dyn Scene> {
    let def_name = def_name_for(variant);
    Box::new(ForestScene::new(
        ForestSceneConfig {
            def_name,
            self_key: slot,
            switch_target,
            seed,
            exit_when_ended: true,
        },
        latch.clone(),
        Box::new(TracingPresenter::new(def_name)),
        mission_log.clone(),
    ))
}

/// Both forest variants, switchable with the switch key. Each slot gets its
/// own seed so the two layouts differ.
pub(crate) fn build_scene_pair(
    seed: u64,
    mission_log: &MissionLog,
) -> (Box<dyn Scene>, Box<dyn Scene>) {
    let latch = SharedActionLatch::default();
    let scene_a = build_level_scene(
        SceneKey::A,
        SceneKey::A,
        Some(SceneKey::B),
        seed,
        &latch,
        mission_log,
    );
    let scene_b = build_level_scene(
        SceneKey::B,
        SceneKey::B,
        Some(SceneKey::A),
        seed ^ GUARDED_SEED_SALT,
        &latch,
        mission_log,
    );
    (scene_a, scene_b)
}

#[cfg(test)]
mod tests;
