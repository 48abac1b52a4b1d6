//! Scripting types and error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or calling Lua plugins.
#[derive(Debug, Error)]
pub enum ScriptingError {
    /// Error from the Lua runtime.
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    #[error("failed to read plugin {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("plugin {path} has no function '{symbol}'")]
    MissingSymbol { path: PathBuf, symbol: String },

    /// A plugin function returned something other than what its contract promises.
    #[error("'{symbol}' must return {expected}")]
    BadReturn { symbol: String, expected: &'static str },
}

/// Configuration for the Lua sandbox.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Maximum memory the Lua VM can allocate (in bytes). 0 = unlimited.
    pub memory_limit: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self::restricted()
    }
}

impl SandboxConfig {
    /// A restrictive sandbox suitable for user plugins.
    pub fn restricted() -> Self {
        Self {
            memory_limit: 64 * 1024 * 1024, // 64 MB, notes can be large
        }
    }
}
