use std::cell::RefCell;
use std::rc::Rc;

use relic_engine::{
    ActionStates, DefDatabase, InputAction, InputSnapshot, Scene, SceneCommand, SceneKey,
};
use tracing::{error, info};

use super::events::LevelEvent;
use super::session::LevelSession;
use crate::app::presentation::{chest_bob_height, MissionLog, MissionRecord, Presenter};

/// Held-key state from the previous tick, shared by both scenes of a pair so
/// a key held across a scene switch does not fire again.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedActionLatch {
    previous: Rc<RefCell<ActionStates>>,
}

impl SharedActionLatch {
    /// True on the tick `action` goes down.
    fn pressed(&self, input: &InputSnapshot, action: InputAction) -> bool {
        let mut previous = self.previous.borrow_mut();
        let down = input.is_down(action);
        let was_down = previous.is_down(action);
        previous.set(action, down);
        down && !was_down
    }
}

pub(crate) struct ForestSceneConfig {
    pub(crate) def_name: &'static str,
    pub(crate) self_key: SceneKey,
    /// Scene toggled to by the switch key; `None` disables switching.
    pub(crate) switch_target: Option<SceneKey>,
    pub(crate) seed: u64,
    /// Leave the loop once the end overlay has been shown.
    pub(crate) exit_when_ended: bool,
}

pub(crate) struct ForestScene {
    config: ForestSceneConfig,
    latch: SharedActionLatch,
    presenter: Box<dyn Presenter<LevelEvent>>,
    mission_log: MissionLog,
    session: Option<LevelSession>,
    restarts: u64,
    overlay_presented: bool,
}

impl ForestScene {
    pub(crate) fn new(
        config: ForestSceneConfig,
        latch: SharedActionLatch,
        presenter: Box<dyn Presenter<LevelEvent>>,
        mission_log: MissionLog,
    ) -> Self {
        Self {
            config,
            latch,
            presenter,
            mission_log,
            session: None,
            restarts: 0,
            overlay_presented: false,
        }
    }

    /// Each restart gets a fresh layout, like reloading the page.
    fn session_seed(&self) -> u64 {
        self.config.seed.wrapping_add(self.restarts)
    }

    #[cfg(test)]
    pub(crate) fn session(&self) -> Option<&LevelSession> {
        self.session.as_ref()
    }
}

impl Scene for ForestScene {
    fn load(&mut self, defs: &DefDatabase) {
        self.overlay_presented = false;
        let Some(archetype) = defs.level_def_by_name(self.config.def_name) else {
            error!(def_name = self.config.def_name, "level_def_missing");
            self.session = None;
            return;
        };
        let session = LevelSession::new(archetype, self.session_seed());
        info!(
            scene = ?self.config.self_key,
            def_name = self.config.def_name,
            label = session.label(),
            restarts = self.restarts,
            "forest_scene_loaded"
        );
        self.session = Some(session);
    }

    fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> SceneCommand {
        let restart = self.latch.pressed(input, InputAction::Restart);
        let switch = self.latch.pressed(input, InputAction::SwitchLevel);
        if restart {
            self.restarts = self.restarts.saturating_add(1);
            return SceneCommand::HardResetTo(self.config.self_key);
        }
        if let (true, Some(target)) = (switch, self.config.switch_target) {
            return SceneCommand::SwitchTo(target);
        }

        let Some(session) = self.session.as_mut() else {
            return SceneCommand::Exit;
        };
        if session.is_ended() {
            if self.overlay_presented && self.config.exit_when_ended {
                return SceneCommand::Exit;
            }
            return SceneCommand::None;
        }
        session.frame_update(fixed_dt_seconds, input);
        SceneCommand::None
    }

    fn on_interval(&mut self) -> SceneCommand {
        if let Some(session) = self.session.as_mut() {
            session.countdown_tick();
        }
        SceneCommand::None
    }

    fn present(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let mut ended = false;
        for event in session.drain_events() {
            ended |= matches!(event, LevelEvent::MissionEnded(_));
            self.presenter.apply(&event);
        }
        if !session.is_ended() {
            let elapsed = session.elapsed_seconds();
            for chest in session.chests().iter().filter(|chest| !chest.opened) {
                self.presenter.apply(&LevelEvent::ChestBobbed {
                    id: chest.id,
                    height: chest_bob_height(elapsed, chest.float_offset),
                });
            }
        }
        if ended {
            self.overlay_presented = true;
            self.mission_log
                .record(MissionRecord::Forest(session.snapshot()));
        }
    }

    fn unload(&mut self) {
        if let Some(session) = self.session.take() {
            info!(
                scene = ?self.config.self_key,
                def_name = self.config.def_name,
                events = session.total_events_emitted(),
                ended = session.is_ended(),
                "forest_scene_unloaded"
            );
        }
        self.overlay_presented = false;
    }

    fn debug_title(&self) -> Option<String> {
        let session = self.session.as_ref()?;
        let hud = session.hud();
        let status = match session.outcome() {
            Some(outcome) => outcome.title,
            None => "RUNNING",
        };
        Some(format!(
            "{} | HP {:.0} | Fragments {}/{} | Time {}s | {}",
            session.label(),
            hud.health,
            hud.fragments_collected,
            hud.fragments_total,
            hud.time_left_seconds,
            status
        ))
    }
}
