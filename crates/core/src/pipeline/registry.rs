//! Turning configured stage identifiers into a [`Pipeline`].

use std::sync::Arc;

use mlua::Function;

use super::builtin::{self, Builtin};
use super::{Phase, Pipeline, PipelineError, StageContext, StageError, TextStage};
use crate::scripting::{LuaPlugin, PluginLoader, parse_binding};

struct BuiltinStage {
    id: String,
    builtin: &'static Builtin,
}

impl TextStage for BuiltinStage {
    fn name(&self) -> &str {
        &self.id
    }

    fn apply(&self, text: &str, _ctx: &StageContext<'_>) -> Result<String, StageError> {
        Ok((self.builtin.apply)(text))
    }
}

/// A Lua function called as `fn(text, ctx) -> string`.
struct LuaStage {
    binding: String,
    symbol: String,
    plugin: Arc<LuaPlugin>,
    function: Function,
}

impl TextStage for LuaStage {
    fn name(&self) -> &str {
        &self.binding
    }

    fn apply(&self, text: &str, ctx: &StageContext<'_>) -> Result<String, StageError> {
        let path = ctx.path.display().to_string();
        let vault_root = ctx.vault_root.display().to_string();
        let phase = ctx.phase.to_string();
        let fields = [
            ("note", ctx.note.as_str()),
            ("path", path.as_str()),
            ("vault_root", vault_root.as_str()),
            ("phase", phase.as_str()),
        ];

        self.plugin.call_text(&self.function, &self.symbol, text, &fields).map_err(|e| {
            StageError { stage: self.binding.clone(), message: e.to_string() }
        })
    }
}

/// Resolves stage identifiers: `$name` for built-ins, `path.lua:symbol` for
/// plugins. Every plugin is loaded and its symbol looked up here, so a bad
/// binding fails before compilation starts.
pub struct StageRegistry<'a> {
    loader: &'a mut PluginLoader,
}

impl<'a> StageRegistry<'a> {
    pub fn new(loader: &'a mut PluginLoader) -> Self {
        Self { loader }
    }

    pub fn build(&mut self, phase: Phase, identifiers: &[String]) -> Result<Pipeline, PipelineError> {
        let stages = identifiers
            .iter()
            .map(|id| self.stage(phase, id.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("{} pipeline: {} stages", phase, stages.len());
        Ok(Pipeline::new(phase, stages))
    }

    fn stage(&mut self, phase: Phase, id: &str) -> Result<Box<dyn TextStage>, PipelineError> {
        if let Some(name) = id.strip_prefix('$') {
            let builtin = builtin::find(name)
                .ok_or_else(|| PipelineError::UnknownBuiltin { name: name.to_string() })?;
            if builtin.phase != phase {
                return Err(PipelineError::WrongPhase {
                    name: name.to_string(),
                    phase,
                    expected: builtin.phase,
                });
            }
            return Ok(Box::new(BuiltinStage { id: id.to_string(), builtin }));
        }

        let (path, symbol) =
            parse_binding(id).ok_or_else(|| PipelineError::InvalidIdentifier(id.to_string()))?;
        let plugin_error =
            |source| PipelineError::Plugin { binding: id.to_string(), source };

        let plugin = self.loader.load(path).map_err(plugin_error)?;
        let function = plugin.function(symbol).map_err(plugin_error)?;

        Ok(Box::new(LuaStage {
            binding: id.to_string(),
            symbol: symbol.to_string(),
            plugin,
            function,
        }))
    }
}
