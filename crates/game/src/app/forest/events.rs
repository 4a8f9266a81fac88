use relic_engine::Vec2;

use super::types::{ActorId, ActorKind, MissionOutcome};

/// Pure state updates for the presentation layer. The simulation never reads
/// them back.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LevelEvent {
    ActorSpawned {
        id: ActorId,
        kind: ActorKind,
        position: Vec2,
    },
    ActorMoved {
        id: ActorId,
        position: Vec2,
        facing: Option<f32>,
    },
    VisibilityChanged {
        id: ActorId,
        visible: bool,
    },
    HudChanged {
        health_pct: f32,
        fragments_pct: f32,
        time_pct: f32,
    },
    Notification(String),
    ChestsSpawned {
        count: u32,
    },
    /// Emitted by the scene, not the simulation, while chests are visible.
    ChestBobbed {
        id: ActorId,
        height: f32,
    },
    MissionEnded(MissionOutcome),
}

#[derive(Debug, Default)]
pub(crate) struct LevelEventBus {
    pending: Vec<LevelEvent>,
    total_emitted: u64,
}

impl LevelEventBus {
    pub(crate) fn emit(&mut self, event: LevelEvent) {
        self.total_emitted = self.total_emitted.saturating_add(1);
        self.pending.push(event);
    }

    /// Hands every event emitted since the last drain to the caller, in order.
    pub(crate) fn drain(&mut self) -> Vec<LevelEvent> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn total_emitted(&self) -> u64 {
        self.total_emitted
    }
}
