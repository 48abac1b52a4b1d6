//! Sandboxed Lua state shared by pipeline stages and sorters.

use mlua::{Lua, LuaOptions, StdLib, Value};

use super::bindings::register_mdpress_table;
use super::types::{SandboxConfig, ScriptingError};

/// Globals removed from every plugin state.
const REMOVED_GLOBALS: &[&str] =
    &["dofile", "loadfile", "load", "require", "package", "io", "os", "debug", "collectgarbage"];

/// A Lua state with only `table`, `string`, `utf8` and `math` loaded, plus
/// the `mdpress` helper table.
///
/// ```rust
/// use mdpress_core::scripting::LuaEngine;
///
/// let engine = LuaEngine::sandboxed().unwrap();
/// let value = engine.exec_chunk(r#"return mdpress.slugify("Hello World")"#, "doc").unwrap();
/// assert_eq!(value.as_string().unwrap().to_string_lossy(), "hello-world");
/// ```
pub struct LuaEngine {
    lua: Lua,
}

impl LuaEngine {
    pub fn new(config: SandboxConfig) -> Result<Self, ScriptingError> {
        let libs = StdLib::TABLE | StdLib::STRING | StdLib::UTF8 | StdLib::MATH;
        let lua = Lua::new_with(libs, LuaOptions::default())?;

        if config.memory_limit > 0 {
            lua.set_memory_limit(config.memory_limit)?;
        }

        let globals = lua.globals();
        for name in REMOVED_GLOBALS {
            globals.set(*name, Value::Nil)?;
        }
        register_mdpress_table(&lua)?;

        Ok(Self { lua })
    }

    pub fn sandboxed() -> Result<Self, ScriptingError> {
        Self::new(SandboxConfig::restricted())
    }

    /// Evaluate a plugin file's source; `name` appears in Lua error messages.
    pub fn exec_chunk(&self, source: &str, name: &str) -> Result<Value, ScriptingError> {
        Ok(self.lua.load(source).set_name(name).eval::<Value>()?)
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(engine: &LuaEngine, source: &str) -> Value {
        engine.exec_chunk(source, "test").unwrap()
    }

    #[test]
    fn test_sandbox_removes_dangerous_globals() {
        let engine = LuaEngine::sandboxed().unwrap();
        for name in REMOVED_GLOBALS {
            assert!(eval(&engine, &format!("return {name}")).is_nil(), "{name} should be nil");
        }
    }

    #[test]
    fn test_string_and_table_libraries_available() {
        let engine = LuaEngine::sandboxed().unwrap();
        let value = eval(&engine, "local t = {'b', 'a'}; table.sort(t); return string.upper(t[1])");
        assert_eq!(value.as_string().unwrap().to_string_lossy(), "A");
    }

    #[test]
    fn test_chunk_name_in_errors() {
        let engine = LuaEngine::sandboxed().unwrap();
        let err = engine.exec_chunk("error('boom')", "fix.lua").unwrap_err();
        assert!(err.to_string().contains("fix.lua"));
    }

    #[test]
    fn test_memory_limit_stops_runaway_plugins() {
        let engine = LuaEngine::new(SandboxConfig { memory_limit: 1024 * 1024 }).unwrap();
        let result = engine.exec_chunk("local t = {} for i = 1, 1e7 do t[i] = i end", "greedy.lua");
        assert!(result.is_err());
    }
}
