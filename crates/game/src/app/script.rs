use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use relic_engine::{ActionStates, InputAction, InputSnapshot, InputSource};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScriptStep {
    pub(crate) at_seconds: f64,
    #[serde(default)]
    pub(crate) press: Vec<String>,
    #[serde(default)]
    pub(crate) release: Vec<String>,
}

#[derive(Debug, Error)]
pub(crate) enum ScriptError {
    #[error("failed to read input script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid input script {path} at {location}: {message}")]
    Decode {
        path: PathBuf,
        location: String,
        message: String,
    },
    #[error("input script {path} step {index}: invalid at_seconds {at_seconds}")]
    InvalidTime {
        path: PathBuf,
        index: usize,
        at_seconds: f64,
    },
}

/// Replays key presses from a JSON timeline against loop time. Steps are
/// applied in time order; unknown key names are ignored.
pub(crate) struct ScriptedInput {
    steps: Vec<ScriptStep>,
    cursor: usize,
    held: ActionStates,
}

impl ScriptedInput {
    pub(crate) fn from_steps(mut steps: Vec<ScriptStep>) -> Self {
        steps.sort_by(|a, b| a.at_seconds.total_cmp(&b.at_seconds));
        Self {
            steps,
            cursor: 0,
            held: ActionStates::default(),
        }
    }

    pub(crate) fn load(path: &Path) -> Result<Self, ScriptError> {
        let raw = fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &raw)
    }

    pub(crate) fn parse(path: &Path, raw: &str) -> Result<Self, ScriptError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let steps: Vec<ScriptStep> = serde_path_to_error::deserialize(&mut deserializer)
            .map_err(|error| ScriptError::Decode {
                path: path.to_path_buf(),
                location: error.path().to_string(),
                message: error.inner().to_string(),
            })?;
        for (index, step) in steps.iter().enumerate() {
            if !step.at_seconds.is_finite() || step.at_seconds < 0.0 {
                return Err(ScriptError::InvalidTime {
                    path: path.to_path_buf(),
                    index,
                    at_seconds: step.at_seconds,
                });
            }
        }
        Ok(Self::from_steps(steps))
    }

    fn apply_keys(&mut self, keys: &[String], is_down: bool) {
        for key in keys {
            match InputAction::from_key_name(key) {
                Some(action) => self.held.set(action, is_down),
                None => warn!(key = %key, "script_key_ignored"),
            }
        }
    }
}

impl InputSource for ScriptedInput {
    fn snapshot_for_tick(&mut self, loop_time: Duration) -> InputSnapshot {
        let now = loop_time.as_secs_f64();
        while let Some(step) = self.steps.get(self.cursor) {
            if step.at_seconds > now {
                break;
            }
            let step = step.clone();
            self.cursor += 1;
            debug!(
                at_seconds = step.at_seconds,
                press = ?step.press,
                release = ?step.release,
                "script_step"
            );
            self.apply_keys(&step.release, false);
            self.apply_keys(&step.press, true);
        }
        InputSnapshot::from_actions(self.held)
    }
}

/// No keys ever held; the level plays out on its own.
pub(crate) struct IdleInput;

impl InputSource for IdleInput {
    fn snapshot_for_tick(&mut self, _loop_time: Duration) -> InputSnapshot {
        InputSnapshot::empty()
    }
}
