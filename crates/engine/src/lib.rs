use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod content;

pub use app::{
    run_app, run_loop, ActionStates, AppError, ClockMode, InputAction, InputSnapshot, InputSource,
    LoopConfig, LoopMetricsSnapshot, MetricsHandle, RunSummary, Scene, SceneCommand, SceneKey,
    StopReason, Transform, Vec2, SLOW_FRAME_ENV_VAR,
};
pub use content::{
    compile_def_database, compile_defs_from_str, write_json_atomic, CompletionRule,
    ContentCompileError, ContentErrorCode, DamageModel, DefDatabase, LevelArchetype, LevelDefId,
    LevelTuning, SourceLocation,
};

pub const ROOT_ENV_VAR: &str = "SKYRELIC_ROOT";

const LAYOUT_DIRS: [&str; 2] = ["crates", "assets"];

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub base_content_dir: PathBuf,
}

impl AppPaths {
    /// `SKYRELIC_ROOT` wins when set; otherwise the first project root above
    /// the running executable.
    pub fn resolve() -> Result<Self, StartupError> {
        let root = match env::var_os(ROOT_ENV_VAR) {
            Some(value) => checked_root(PathBuf::from(value))?,
            None => {
                let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
                find_root_above(&exe)?
            }
        };
        Ok(Self::from_root(root))
    }

    pub fn from_root(root: PathBuf) -> Self {
        let base_content_dir = root.join("assets").join("base");
        Self {
            root,
            base_content_dir,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to locate the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("SKYRELIC_ROOT does not name a project root: {path}")]
    InvalidEnvRoot { path: PathBuf },
    #[error("no project root above {exe}; set SKYRELIC_ROOT")]
    RootNotFound { exe: PathBuf },
}

fn checked_root(candidate: PathBuf) -> Result<PathBuf, StartupError> {
    let root = canonical(&candidate);
    if is_project_root(&root) {
        Ok(root)
    } else {
        Err(StartupError::InvalidEnvRoot { path: root })
    }
}

fn find_root_above(exe: &Path) -> Result<PathBuf, StartupError> {
    exe.ancestors()
        .skip(1)
        .find(|dir| is_project_root(dir))
        .map(canonical)
        .ok_or_else(|| StartupError::RootNotFound {
            exe: exe.to_path_buf(),
        })
}

// Cargo.toml next to a crates/ or assets/ directory.
fn is_project_root(dir: &Path) -> bool {
    let has_layout = LAYOUT_DIRS.iter().any(|name| dir.join(name).is_dir());
    dir.join("Cargo.toml").is_file() && has_layout
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
