mod atomic_io;
mod compiler;
mod database;

pub use atomic_io::write_json_atomic;
pub use compiler::{
    compile_def_database, compile_defs_from_str, ContentCompileError, ContentErrorCode,
    SourceLocation,
};
pub use database::{
    CompletionRule, DamageModel, DefDatabase, LevelArchetype, LevelDefId, LevelTuning,
};
