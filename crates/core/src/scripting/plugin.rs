//! Loading user plugins (`path/to/file.lua:symbol`) and calling them.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mlua::{Function, LuaSerdeExt, Table, Value};

use super::engine::LuaEngine;
use super::types::{SandboxConfig, ScriptingError};

/// Split a plugin binding `path/to/file.lua:symbol` into its parts.
pub fn parse_binding(binding: &str) -> Option<(&str, &str)> {
    let (path, symbol) = binding.rsplit_once(':')?;
    let (path, symbol) = (path.trim(), symbol.trim());
    (!path.is_empty() && !symbol.is_empty()).then_some((path, symbol))
}

/// One evaluated plugin file.
///
/// The Lua state is not reentrant: every call takes the plugin's lock, so
/// calls from different worker threads serialize per plugin.
pub struct LuaPlugin {
    path: PathBuf,
    engine: Mutex<LuaEngine>,
    /// Table returned by the chunk, if any.
    exports: Option<Table>,
}

impl LuaPlugin {
    /// Read and evaluate a plugin file once.
    pub fn load(path: &Path, config: SandboxConfig) -> Result<Self, ScriptingError> {
        let source = fs::read_to_string(path)
            .map_err(|source| ScriptingError::Read { path: path.to_path_buf(), source })?;

        let engine = LuaEngine::new(config)?;
        let exports = match engine.exec_chunk(&source, &path.display().to_string())? {
            Value::Table(table) => Some(table),
            _ => None,
        };

        tracing::debug!("loaded plugin {}", path.display());
        Ok(Self { path: path.to_path_buf(), engine: Mutex::new(engine), exports })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn engine(&self) -> MutexGuard<'_, LuaEngine> {
        // A panic in another caller leaves the Lua state usable
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Find `symbol` in the returned table, else among the globals.
    pub fn function(&self, symbol: &str) -> Result<Function, ScriptingError> {
        let engine = self.engine();

        if let Some(exports) = &self.exports
            && let Value::Function(f) = exports.get::<Value>(symbol)?
        {
            return Ok(f);
        }
        match engine.lua().globals().get::<Value>(symbol)? {
            Value::Function(f) => Ok(f),
            _ => Err(ScriptingError::MissingSymbol {
                path: self.path.clone(),
                symbol: symbol.to_string(),
            }),
        }
    }

    /// Call `fn(text, ctx) -> string`. `ctx` is passed as a table of strings.
    pub fn call_text(
        &self,
        function: &Function,
        symbol: &str,
        text: &str,
        ctx: &[(&str, &str)],
    ) -> Result<String, ScriptingError> {
        let engine = self.engine();
        let lua = engine.lua();

        let ctx_table = lua.create_table()?;
        for (key, value) in ctx {
            ctx_table.set(*key, *value)?;
        }

        match function.call::<Value>((text, ctx_table))? {
            Value::String(s) => Ok(s.to_str()?.to_string()),
            _ => Err(ScriptingError::BadReturn { symbol: symbol.to_string(), expected: "a string" }),
        }
    }

    /// Call `fn(ids, notes) -> ids` where `notes` maps each id to `entries[id]`.
    pub fn call_sort<T: serde::Serialize>(
        &self,
        function: &Function,
        symbol: &str,
        ids: &[String],
        entries: &[(String, T)],
    ) -> Result<Vec<String>, ScriptingError> {
        let engine = self.engine();
        let lua = engine.lua();

        let id_list = lua.create_sequence_from(ids.iter().map(String::as_str))?;
        let notes = lua.create_table()?;
        for (id, entry) in entries {
            notes.set(id.as_str(), lua.to_value(entry)?)?;
        }

        let bad_return =
            || ScriptingError::BadReturn { symbol: symbol.to_string(), expected: "a list of ids" };
        let Value::Table(result) = function.call::<Value>((id_list, notes))? else {
            return Err(bad_return());
        };
        result
            .sequence_values::<Value>()
            .map(|v| -> Result<String, ScriptingError> {
                match v? {
                    Value::String(s) => Ok(s.to_str()?.to_string()),
                    _ => Err(bad_return()),
                }
            })
            .collect()
    }
}

/// Loads each plugin file at most once; stages and sorters bound to the same
/// file share one Lua state.
pub struct PluginLoader {
    base_dir: PathBuf,
    config: SandboxConfig,
    loaded: HashMap<PathBuf, Arc<LuaPlugin>>,
}

impl PluginLoader {
    /// Relative plugin paths are resolved against `base_dir`.
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            config: SandboxConfig::restricted(),
            loaded: HashMap::new(),
        }
    }

    pub fn load(&mut self, path: &str) -> Result<Arc<LuaPlugin>, ScriptingError> {
        let full = self.base_dir.join(path);
        if let Some(plugin) = self.loaded.get(&full) {
            return Ok(Arc::clone(plugin));
        }
        let plugin = Arc::new(LuaPlugin::load(&full, self.config.clone())?);
        self.loaded.insert(full, Arc::clone(&plugin));
        Ok(plugin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn plugin(source: &str) -> (TempDir, Arc<LuaPlugin>) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("p.lua"), source).unwrap();
        let plugin = PluginLoader::new(dir.path()).load("p.lua").unwrap();
        (dir, plugin)
    }

    #[test]
    fn test_parse_binding() {
        assert_eq!(parse_binding("plugins/fix.lua:run"), Some(("plugins/fix.lua", "run")));
        assert_eq!(parse_binding("C:/x.lua:run"), Some(("C:/x.lua", "run")));
        assert_eq!(parse_binding("fix.lua"), None);
        assert_eq!(parse_binding("fix.lua:"), None);
    }

    #[test]
    fn test_exported_table_takes_precedence() {
        let (_dir, plugin) = plugin(
            "function up(t) return 'global' end\nreturn { up = function(t, ctx) return string.upper(t) .. ctx.note end }",
        );
        let f = plugin.function("up").unwrap();
        let out = plugin.call_text(&f, "up", "abc", &[("note", "-n")]).unwrap();
        assert_eq!(out, "ABC-n");
    }

    #[test]
    fn test_global_function_fallback() {
        let (_dir, plugin) = plugin("function twice(t) return t .. t end");
        let f = plugin.function("twice").unwrap();
        assert_eq!(plugin.call_text(&f, "twice", "ab", &[]).unwrap(), "abab");
    }

    #[test]
    fn test_missing_symbol() {
        let (_dir, plugin) = plugin("x = 1");
        assert!(matches!(
            plugin.function("nope"),
            Err(ScriptingError::MissingSymbol { .. })
        ));
    }

    #[test]
    fn test_non_string_return_is_error() {
        let (_dir, plugin) = plugin("function f(t) return 42 end");
        let f = plugin.function("f").unwrap();
        assert!(matches!(
            plugin.call_text(&f, "f", "x", &[]),
            Err(ScriptingError::BadReturn { .. })
        ));
    }

    #[test]
    fn test_sort_call() {
        let (_dir, plugin) = plugin(
            "function rev(ids, notes)\n local out = {}\n for i = #ids, 1, -1 do out[#out + 1] = ids[i] end\n return out\nend",
        );
        let f = plugin.function("rev").unwrap();
        let ids = vec!["a".to_string(), "b".to_string()];
        let entries = vec![("a".to_string(), 1), ("b".to_string(), 2)];
        assert_eq!(plugin.call_sort(&f, "rev", &ids, &entries).unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn test_unreadable_file() {
        let dir = TempDir::new().unwrap();
        let result = PluginLoader::new(dir.path()).load("missing.lua");
        assert!(matches!(result, Err(ScriptingError::Read { .. })));
    }
}
