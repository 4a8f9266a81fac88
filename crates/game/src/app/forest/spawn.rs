use std::f32::consts::TAU;

use rand::Rng;
use relic_engine::{LevelTuning, Vec2};

use super::types::ActorKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EnemySpawn {
    pub(crate) position: Vec2,
    pub(crate) kind: ActorKind,
    pub(crate) heading: f32,
}

/// Initial placement of every actor in a level. Chests are not part of the
/// layout; they appear once the fragments are in.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LevelLayout {
    pub(crate) player: Vec2,
    pub(crate) obstacles: Vec<Vec2>,
    pub(crate) fragments: Vec<Vec2>,
    pub(crate) enemies: Vec<EnemySpawn>,
}

impl LevelLayout {
    #[cfg(test)]
    pub(crate) fn with_player(player: Vec2) -> Self {
        Self {
            player,
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub(crate) fn obstacle(mut self, position: Vec2) -> Self {
        self.obstacles.push(position);
        self
    }

    #[cfg(test)]
    pub(crate) fn fragment(mut self, position: Vec2) -> Self {
        self.fragments.push(position);
        self
    }

    #[cfg(test)]
    pub(crate) fn enemy(mut self, position: Vec2, heading: f32) -> Self {
        self.enemies.push(EnemySpawn {
            position,
            kind: ActorKind::Enemy,
            heading,
        });
        self
    }
}

/// Scatters trees over the whole world and everything else over the inner
/// spawn square. Tree rolls that land in the start clearing are skipped, so
/// a level usually ends up with fewer than `tree_count` trees.
pub(crate) fn random_layout(tuning: &LevelTuning, rng: &mut impl Rng) -> LevelLayout {
    let mut layout = LevelLayout::default();

    for _ in 0..tuning.tree_count {
        let position = random_point(rng, tuning.world_half_extent);
        if position.x.abs() < tuning.spawn_clearing && position.y.abs() < tuning.spawn_clearing {
            continue;
        }
        layout.obstacles.push(position);
    }

    for index in 0..tuning.fragment_count {
        let position = random_point(rng, tuning.spawn_half_extent);
        layout.fragments.push(position);
        if index < tuning.guard_count {
            layout.enemies.push(EnemySpawn {
                position: position + Vec2::new(tuning.guard_offset, tuning.guard_offset),
                kind: ActorKind::Guard,
                heading: rng.gen_range(0.0..TAU),
            });
        }
    }

    for _ in 0..tuning.enemy_count {
        layout.enemies.push(EnemySpawn {
            position: random_point(rng, tuning.spawn_half_extent),
            kind: ActorKind::Enemy,
            heading: rng.gen_range(0.0..TAU),
        });
    }

    layout
}

pub(crate) fn random_point(rng: &mut impl Rng, half_extent: f32) -> Vec2 {
    if half_extent <= 0.0 {
        return Vec2::ZERO;
    }
    Vec2::new(
        rng.gen_range(-half_extent..half_extent),
        rng.gen_range(-half_extent..half_extent),
    )
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn random_layout_respects_extents_and_clearing() {
        let tuning = LevelTuning::default();
        let mut rng = StdRng::seed_from_u64(7);
        let layout = random_layout(&tuning, &mut rng);

        assert_eq!(layout.player, Vec2::ZERO);
        assert!(layout.obstacles.len() <= tuning.tree_count as usize);
        for tree in &layout.obstacles {
            assert!(tree.x.abs() <= tuning.world_half_extent);
            assert!(tree.y.abs() <= tuning.world_half_extent);
            let in_clearing =
                tree.x.abs() < tuning.spawn_clearing && tree.y.abs() < tuning.spawn_clearing;
            assert!(!in_clearing);
        }
        assert_eq!(layout.fragments.len(), 5);
        for fragment in &layout.fragments {
            assert!(fragment.x.abs() <= tuning.spawn_half_extent);
            assert!(fragment.y.abs() <= tuning.spawn_half_extent);
        }
    }

    #[test]
    fn guards_sit_next_to_the_first_fragments() {
        let tuning = LevelTuning::default();
        let mut rng = StdRng::seed_from_u64(11);
        let layout = random_layout(&tuning, &mut rng);

        let guards: Vec<_> = layout
            .enemies
            .iter()
            .filter(|spawn| spawn.kind == ActorKind::Guard)
            .collect();
        assert_eq!(guards.len(), 2);
        assert_eq!(layout.enemies.len(), 8);
        for (guard, fragment) in guards.iter().zip(&layout.fragments) {
            let expected = *fragment + Vec2::new(1.8, 1.8);
            assert!(guard.position.distance(expected) < 1e-5);
        }
    }

    #[test]
    fn same_seed_gives_same_layout() {
        let tuning = LevelTuning::default();
        let first = random_layout(&tuning, &mut StdRng::seed_from_u64(3));
        let second = random_layout(&tuning, &mut StdRng::seed_from_u64(3));
        assert_eq!(first, second);
    }
}
