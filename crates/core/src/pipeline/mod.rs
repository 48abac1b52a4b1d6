//! Ordered text pipelines run around conversion.
//!
//! A pipeline is built once per phase from the configured identifiers and
//! then shared read-only by every compile task.

pub mod builtin;
pub mod registry;

use std::fmt;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::index::NoteId;
use crate::scripting::ScriptingError;

pub use registry::StageRegistry;

/// Where in a note's compilation a pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Markdown to Markdown, before conversion.
    Pre,
    /// LaTeX to LaTeX, after conversion.
    Post,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Pre => "pre",
            Phase::Post => "post",
        })
    }
}

/// Read-only information handed to every stage.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub note: &'a NoteId,
    /// Note path relative to the vault root.
    pub path: &'a Path,
    pub vault_root: &'a Path,
    pub phase: Phase,
}

/// Failure of one stage on one note. Only that note's compilation fails.
#[derive(Debug, Error)]
#[error("stage '{stage}' failed: {message}")]
pub struct StageError {
    pub stage: String,
    pub message: String,
}

/// Invalid pipeline configuration, detected before any note is compiled.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown built-in stage '${name}'")]
    UnknownBuiltin { name: String },

    #[error("built-in stage '${name}' runs in the {expected} phase, not {phase}")]
    WrongPhase { name: String, phase: Phase, expected: Phase },

    #[error("invalid stage '{0}': expected '$name' or 'path/to/plugin.lua:function'")]
    InvalidIdentifier(String),

    #[error("failed to load stage '{binding}': {source}")]
    Plugin {
        binding: String,
        #[source]
        source: ScriptingError,
    },
}

/// A single text transformation.
pub trait TextStage: Send + Sync {
    /// Identifier as configured (`$name` or `path:symbol`).
    fn name(&self) -> &str;

    fn apply(&self, text: &str, ctx: &StageContext<'_>) -> Result<String, StageError>;
}

/// Stages of one phase, in configured order.
pub struct Pipeline {
    phase: Phase,
    stages: Vec<Box<dyn TextStage>>,
}

impl Pipeline {
    pub fn new(phase: Phase, stages: Vec<Box<dyn TextStage>>) -> Self {
        Self { phase, stages }
    }

    pub fn empty(phase: Phase) -> Self {
        Self::new(phase, Vec::new())
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name())
    }

    /// Run every stage in order, each on the previous stage's output.
    /// The first failing stage stops the run.
    pub fn run(&self, text: &str, ctx: &StageContext<'_>) -> Result<String, StageError> {
        let mut current = text.to_string();
        for stage in &self.stages {
            tracing::debug!("{}: {} stage {}", ctx.note, self.phase, stage.name());
            current = stage.apply(&current, ctx)?;
        }
        Ok(current)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("phase", &self.phase)
            .field("stages", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Append(&'static str);

    impl TextStage for Append {
        fn name(&self) -> &str {
            self.0
        }

        fn apply(&self, text: &str, _ctx: &StageContext<'_>) -> Result<String, StageError> {
            Ok(format!("{text}{}", self.0))
        }
    }

    struct Fail;

    impl TextStage for Fail {
        fn name(&self) -> &str {
            "fail"
        }

        fn apply(&self, _text: &str, _ctx: &StageContext<'_>) -> Result<String, StageError> {
            Err(StageError { stage: "fail".into(), message: "always".into() })
        }
    }

    fn ctx(id: &NoteId) -> StageContext<'_> {
        StageContext { note: id, path: Path::new("a.md"), vault_root: Path::new("/v"), phase: Phase::Pre }
    }

    #[test]
    fn test_stages_run_in_order() {
        let id = NoteId::normalize("a");
        let pipeline = Pipeline::new(Phase::Pre, vec![Box::new(Append("1")), Box::new(Append("2"))]);
        assert_eq!(pipeline.run("x", &ctx(&id)).unwrap(), "x12");
    }

    #[test]
    fn test_failure_stops_pipeline() {
        let id = NoteId::normalize("a");
        let pipeline = Pipeline::new(Phase::Pre, vec![Box::new(Fail), Box::new(Append("2"))]);
        let err = pipeline.run("x", &ctx(&id)).unwrap_err();
        assert_eq!(err.stage, "fail");
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let id = NoteId::normalize("a");
        assert_eq!(Pipeline::empty(Phase::Post).run("same", &ctx(&id)).unwrap(), "same");
    }
}
