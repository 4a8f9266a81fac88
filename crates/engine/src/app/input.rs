#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveForward,
    MoveBack,
    MoveLeft,
    MoveRight,
    /// Rebuilds the active level from scratch.
    Restart,
    /// Toggles to the other loaded scene.
    SwitchLevel,
    Quit,
}

const ACTION_COUNT: usize = 7;

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveForward => 0,
            InputAction::MoveBack => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Restart => 4,
            InputAction::SwitchLevel => 5,
            InputAction::Quit => 6,
        }
    }

    /// Maps a browser-style key name to an action. Unrecognised names map to
    /// `None` and are meant to be ignored by callers.
    pub fn from_key_name(name: &str) -> Option<Self> {
        match name {
            "w" | "W" | "ArrowUp" => Some(Self::MoveForward),
            "s" | "S" | "ArrowDown" => Some(Self::MoveBack),
            "a" | "A" | "ArrowLeft" => Some(Self::MoveLeft),
            "d" | "D" | "ArrowRight" => Some(Self::MoveRight),
            "r" | "R" => Some(Self::Restart),
            "Tab" => Some(Self::SwitchLevel),
            "Escape" => Some(Self::Quit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub fn any_down(&self) -> bool {
        self.down.iter().any(|down| *down)
    }

    pub fn clear(&mut self) {
        self.down = [false; ACTION_COUNT];
    }
}
