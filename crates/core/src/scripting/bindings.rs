//! Lua bindings exposed to plugins.
//!
//! This module provides the `mdpress` global table with a few helpers that
//! plugins commonly need when rewriting note text or generated markup.

use mlua::{Function, Lua, Result as LuaResult};

use crate::render::escape_latex;
use crate::vault::slug::slugify;

/// Register the `mdpress` global table with all bindings.
///
/// After calling this function, Lua plugins can use:
/// - `mdpress.slugify(text)` - Heading slug, as used for `h:` labels
/// - `mdpress.escape_latex(text)` - Escape LaTeX special characters
/// - `mdpress.log(message)` / `mdpress.warn(message)` - Write to the run log
pub fn register_mdpress_table(lua: &Lua) -> LuaResult<()> {
    let mdpress = lua.create_table()?;

    mdpress.set("slugify", lua.create_function(|_, text: String| Ok(slugify(&text)))?)?;
    mdpress.set(
        "escape_latex",
        lua.create_function(|_, text: String| Ok(escape_latex(&text)))?,
    )?;
    mdpress.set("log", create_log_fn(lua, false)?)?;
    mdpress.set("warn", create_log_fn(lua, true)?)?;

    lua.globals().set("mdpress", mdpress)?;
    Ok(())
}

fn create_log_fn(lua: &Lua, warn: bool) -> LuaResult<Function> {
    lua.create_function(move |_, message: String| {
        if warn {
            tracing::warn!(target: "mdpress::plugin", "{}", message);
        } else {
            tracing::info!(target: "mdpress::plugin", "{}", message);
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use crate::scripting::LuaEngine;

    fn eval_string(source: &str) -> String {
        let engine = LuaEngine::sandboxed().unwrap();
        let value = engine.exec_chunk(source, "test").unwrap();
        value.as_string().unwrap().to_string_lossy()
    }

    #[test]
    fn test_slugify_binding() {
        assert_eq!(eval_string(r#"return mdpress.slugify("Hello, World!")"#), "hello-world");
    }

    #[test]
    fn test_escape_latex_binding() {
        assert_eq!(eval_string(r#"return mdpress.escape_latex("50% & more")"#), r"50\% \& more");
    }

    #[test]
    fn test_log_returns_nothing() {
        let engine = LuaEngine::sandboxed().unwrap();
        assert!(engine.exec_chunk(r#"return mdpress.log("hi")"#, "test").unwrap().is_nil());
    }
}
