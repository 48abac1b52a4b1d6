//! Lua plugin support.
//!
//! User plugins extend the text pipeline and the book sorters. Each plugin
//! file is evaluated once in a sandboxed Lua state; a binding such as
//! `plugins/fix.lua:fix_spacing` names the file and the function to call.
//!
//! # Available Lua Functions
//!
//! The `mdpress` global table provides:
//!
//! - `mdpress.slugify(text)` - Heading slug, as used for `h:` labels
//! - `mdpress.escape_latex(text)` - Escape LaTeX special characters
//! - `mdpress.log(message)` / `mdpress.warn(message)` - Write to the run log
//!
//! # Security
//!
//! The Lua environment is sandboxed to prevent:
//! - File system access (`io` library removed)
//! - Shell command execution (`os` library removed)
//! - Loading external modules (`require` removed)
//! - Arbitrary code loading (`load`, `loadfile`, `dofile` removed)
//! - Debug library access (`debug` removed)

pub mod bindings;
pub mod engine;
pub mod plugin;
pub mod types;

pub use engine::LuaEngine;
pub use plugin::{LuaPlugin, PluginLoader, parse_binding};
pub use types::{SandboxConfig, ScriptingError};
