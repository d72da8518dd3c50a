//! Lua command scripts.
//!
//! Command scripts live under `<scripts_dir>/<extension_point>/` and run in a
//! sandboxed interpreter with instruction, memory and time limits.

pub mod catalog;
pub mod engine;
pub mod loader;
pub mod types;

pub use catalog::LuaCatalog;
pub use engine::{ScriptEngine, ScriptLimits, ENTRY_POINT};
pub use loader::ScriptLoader;
pub use types::{CommandScript, ScriptMetadata};
