use std::ops::{Add, AddAssign, Mul, Sub};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::input::{ActionStates, InputAction};
use crate::content::DefDatabase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneKey {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    SwitchTo(SceneKey),
    HardResetTo(SceneKey),
    Exit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    quit_requested: bool,
    actions: ActionStates,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_actions(actions: ActionStates) -> Self {
        Self {
            quit_requested: actions.is_down(InputAction::Quit),
            actions,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        if action == InputAction::Quit {
            self.quit_requested = is_down;
        }
        self
    }
}

/// Ground-plane point. `y` is the depth axis of the level (forward is `-y`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length_sq(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    pub fn normalized_or_zero(self) -> Self {
        let len_sq = self.length_sq();
        if len_sq > 0.0 && len_sq.is_finite() {
            let inv_len = len_sq.sqrt().recip();
            Self {
                x: self.x * inv_len,
                y: self.y * inv_len,
            }
        } else {
            Self::ZERO
        }
    }

    /// Yaw that makes a model face along `self`, `atan2(x, y)`.
    pub fn facing_radians(self) -> f32 {
        self.x.atan2(self.y)
    }

    /// Unit vector for a yaw produced by [`Vec2::facing_radians`].
    pub fn from_facing(radians: f32) -> Self {
        Self {
            x: radians.sin(),
            y: radians.cos(),
        }
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub rotation_radians: Option<f32>,
}

impl Transform {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            rotation_radians: None,
        }
    }
}

pub trait Scene {
    fn load(&mut self, defs: &DefDatabase);
    fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> SceneCommand;
    /// Called once per interval period of frame time, independent of tick rate.
    fn on_interval(&mut self) -> SceneCommand {
        SceneCommand::None
    }
    fn present(&mut self) {}
    fn unload(&mut self);
    fn debug_title(&self) -> Option<String> {
        None
    }
}

struct SceneRuntime {
    scene: Box<dyn Scene>,
    is_loaded: bool,
}

impl SceneRuntime {
    fn new(scene: Box<dyn Scene>) -> Self {
        Self {
            scene,
            is_loaded: false,
        }
    }
}

pub(crate) struct SceneMachine {
    scene_a: SceneRuntime,
    scene_b: SceneRuntime,
    active_scene: SceneKey,
    defs: DefDatabase,
}

impl SceneMachine {
    pub(crate) fn new(
        scene_a: Box<dyn Scene>,
        scene_b: Box<dyn Scene>,
        active_scene: SceneKey,
        defs: DefDatabase,
    ) -> Self {
        Self {
            scene_a: SceneRuntime::new(scene_a),
            scene_b: SceneRuntime::new(scene_b),
            active_scene,
            defs,
        }
    }

    pub(crate) fn active_scene(&self) -> SceneKey {
        self.active_scene
    }

    pub(crate) fn load_active(&mut self) {
        let active = self.active_scene;
        self.load(active);
    }

    fn load(&mut self, key: SceneKey) {
        let defs = &self.defs;
        let runtime = match key {
            SceneKey::A => &mut self.scene_a,
            SceneKey::B => &mut self.scene_b,
        };
        if runtime.is_loaded {
            return;
        }
        runtime.scene.load(defs);
        runtime.is_loaded = true;
    }

    fn unload(&mut self, key: SceneKey) {
        let runtime = self.runtime_mut(key);
        if !runtime.is_loaded {
            return;
        }
        runtime.scene.unload();
        runtime.is_loaded = false;
    }

    pub(crate) fn update_active(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
    ) -> SceneCommand {
        self.active_runtime_mut()
            .scene
            .update(fixed_dt_seconds, input)
    }

    pub(crate) fn interval_active(&mut self) -> SceneCommand {
        self.active_runtime_mut().scene.on_interval()
    }

    pub(crate) fn present_active(&mut self) {
        self.active_runtime_mut().scene.present();
    }

    pub(crate) fn debug_title_active(&self) -> Option<String> {
        self.active_runtime_ref().scene.debug_title()
    }

    /// Switching keeps the previous scene loaded so it resumes where it left off.
    pub(crate) fn switch_to(&mut self, next: SceneKey) -> bool {
        if next == self.active_scene {
            return false;
        }
        self.active_scene = next;
        self.load(next);
        info!(scene = ?next, "scene_switched");
        true
    }

    pub(crate) fn hard_reset_to(&mut self, next: SceneKey) -> bool {
        self.unload(next);
        self.active_scene = next;
        self.load(next);
        info!(scene = ?next, "scene_hard_reset");
        true
    }

    pub(crate) fn shutdown_all(&mut self) {
        self.unload(SceneKey::A);
        self.unload(SceneKey::B);
    }

    fn runtime_mut(&mut self, key: SceneKey) -> &mut SceneRuntime {
        match key {
            SceneKey::A => &mut self.scene_a,
            SceneKey::B => &mut self.scene_b,
        }
    }

    fn active_runtime_ref(&self) -> &SceneRuntime {
        match self.active_scene {
            SceneKey::A => &self.scene_a,
            SceneKey::B => &self.scene_b,
        }
    }

    fn active_runtime_mut(&mut self) -> &mut SceneRuntime {
        let key = self.active_scene;
        self.runtime_mut(key)
    }
}
